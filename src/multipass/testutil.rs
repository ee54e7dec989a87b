//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex};

use super::keys::KeyPair;
use super::service::HandleService;

pub const SIGNING_KEY_PEM: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/signing_key.pem"
));

pub const OTHER_KEY_PEM: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/other_key.pem"
));

#[allow(clippy::expect_used)]
pub fn signing_keys() -> KeyPair {
    KeyPair::from_pem(SIGNING_KEY_PEM).expect("signing fixture key")
}

#[allow(clippy::expect_used)]
pub fn other_keys() -> KeyPair {
    KeyPair::from_pem(OTHER_KEY_PEM).expect("other fixture key")
}

/// Handle service that records notifications instead of delivering them.
#[derive(Debug, Default)]
pub struct RecordingService {
    pub handles: Vec<String>,
    pub denied: Vec<String>,
    pub fail_notify: bool,
    pub notified: Mutex<Vec<(String, String)>>,
}

impl RecordingService {
    pub fn listing(handles: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            handles: handles.iter().map(ToString::to_string).collect(),
            ..Self::default()
        })
    }

    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notified
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }
}

impl HandleService for RecordingService {
    fn listed(&self, handle: &str) -> bool {
        self.handles.iter().any(|h| h == handle)
    }

    fn authorized(&self, handle: &str, _method: &str, resource: &str) -> bool {
        self.listed(handle) && !self.denied.iter().any(|d| resource.starts_with(d.as_str()))
    }

    fn notify(&self, handle: &str, login_url: &str) -> anyhow::Result<()> {
        if self.fail_notify {
            anyhow::bail!("delivery refused");
        }
        if let Ok(mut notified) = self.notified.lock() {
            notified.push((handle.to_string(), login_url.to_string()));
        }
        Ok(())
    }

    fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
