//! Handle service abstraction.
//!
//! The engine never decides on its own who may log in or how a login link
//! reaches its owner. Both questions are delegated to a `HandleService`.
//! `IoHandleService` is the reference implementation: an in-memory allow list
//! that writes login links to a writer (stdout by default).

use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::io::Write;
use std::sync::{Mutex, RwLock};
use tracing::info;

/// Answers who may log in and delivers login links.
pub trait HandleService: Send + Sync {
    /// Whether `handle` may hold a token at all.
    fn listed(&self, handle: &str) -> bool;

    /// Whether `handle` may access `resource` (path and query) with `method`.
    fn authorized(&self, handle: &str, method: &str, resource: &str) -> bool;

    /// Deliver `login_url` to `handle` out of band.
    fn notify(&self, handle: &str, login_url: &str) -> Result<()>;

    /// Release delivery resources.
    fn close(&self) -> Result<()>;
}

pub struct IoHandleService {
    handles: RwLock<HashSet<String>>,
    resources: RwLock<Vec<String>>,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl IoHandleService {
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            handles: RwLock::new(HashSet::new()),
            resources: RwLock::new(Vec::new()),
            writer: Mutex::new(writer),
        }
    }

    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    #[must_use]
    pub fn with_handles<I, S>(self, handles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for handle in handles {
            self.add_handle(handle);
        }
        self
    }

    /// Resource prefixes only listed handles may reach.
    #[must_use]
    pub fn with_resources<I, S>(self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for resource in resources {
            self.add_resource(resource);
        }
        self
    }

    pub fn add_handle(&self, handle: impl Into<String>) {
        if let Ok(mut handles) = self.handles.write() {
            handles.insert(handle.into());
        }
    }

    pub fn add_resource(&self, resource: impl Into<String>) {
        if let Ok(mut resources) = self.resources.write() {
            resources.push(resource.into());
        }
    }

    fn protected(&self, resource: &str) -> bool {
        let path = resource.split('?').next().unwrap_or(resource);
        self.resources
            .read()
            .map(|resources| resources.iter().any(|r| path.starts_with(r.as_str())))
            .unwrap_or(true)
    }
}

impl Default for IoHandleService {
    fn default() -> Self {
        Self::stdout()
    }
}

impl std::fmt::Debug for IoHandleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoHandleService")
            .field("handles", &self.handles)
            .field("resources", &self.resources)
            .finish_non_exhaustive()
    }
}

impl HandleService for IoHandleService {
    fn listed(&self, handle: &str) -> bool {
        self.handles
            .read()
            .map(|handles| handles.contains(handle))
            .unwrap_or(false)
    }

    fn authorized(&self, handle: &str, _method: &str, resource: &str) -> bool {
        if self.protected(resource) {
            self.listed(handle)
        } else {
            true
        }
    }

    fn notify(&self, handle: &str, login_url: &str) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("notification writer poisoned"))?;
        writeln!(writer, "{handle} {login_url}").context("failed to write login link")?;
        writer.flush().context("failed to flush login link")?;
        info!(handle, "login link written");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.writer
            .lock()
            .map_err(|_| anyhow!("notification writer poisoned"))?
            .flush()
            .context("failed to flush notification writer")
    }
}
