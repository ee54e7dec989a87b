//! Engine configuration.

use secrecy::SecretString;
use std::time::Duration;
use url::Url;

use super::error::Error;

pub const DEFAULT_BASE_PATH: &str = "/multipass";
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_SHORT_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_SHORT_LENGTH: usize = 80;
pub const MAX_SHORT_LENGTH: usize = 1024;

#[derive(Clone, Debug)]
pub struct Config {
    site_addr: String,
    base_path: String,
    resources: Vec<String>,
    token_ttl: Duration,
    csrf: bool,
    short: bool,
    short_ttl: Duration,
    short_length: usize,
    private_key: Option<SecretString>,
}

impl Config {
    /// Defaults: `/multipass` base path, `["/"]` resources, 24h tokens, CSRF
    /// protection and 80 character short links valid for one minute.
    #[must_use]
    pub fn new(site_addr: impl Into<String>) -> Self {
        Self {
            site_addr: site_addr.into(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            resources: vec!["/".to_string()],
            token_ttl: DEFAULT_TOKEN_TTL,
            csrf: true,
            short: true,
            short_ttl: DEFAULT_SHORT_TTL,
            short_length: DEFAULT_SHORT_LENGTH,
            private_key: None,
        }
    }

    /// The base path is cleaned and made absolute. A path that cleans to `/`
    /// leaves the current base path untouched.
    #[must_use]
    pub fn with_base_path(mut self, base_path: &str) -> Self {
        if let Some(path) = normalize_base_path(base_path) {
            self.base_path = path;
        }
        self
    }

    #[must_use]
    pub fn with_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources = resources.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_csrf(mut self, enabled: bool) -> Self {
        self.csrf = enabled;
        self
    }

    #[must_use]
    pub fn with_short(mut self, enabled: bool) -> Self {
        self.short = enabled;
        self
    }

    #[must_use]
    pub fn with_short_ttl(mut self, ttl: Duration) -> Self {
        self.short_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_short_length(mut self, length: usize) -> Self {
        self.short_length = length;
        self
    }

    #[must_use]
    pub fn with_private_key(mut self, pem: SecretString) -> Self {
        self.private_key = Some(pem);
        self
    }

    /// Check every option once before the engine is built.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` naming the first offending option.
    pub fn validate(self) -> Result<Self, Error> {
        let site = Url::parse(&self.site_addr)
            .map_err(|e| Error::InvalidConfig(format!("site address: {e}")))?;
        if !matches!(site.scheme(), "http" | "https") || site.host_str().is_none() {
            return Err(Error::InvalidConfig(format!(
                "site address must be an absolute http(s) URL: {}",
                self.site_addr
            )));
        }
        if self.resources.is_empty() {
            return Err(Error::InvalidConfig("resources must not be empty".to_string()));
        }
        if let Some(resource) = self.resources.iter().find(|r| !r.starts_with('/')) {
            return Err(Error::InvalidConfig(format!(
                "resource must be an absolute path: {resource}"
            )));
        }
        if self.token_ttl.is_zero() {
            return Err(Error::InvalidConfig("token ttl must be positive".to_string()));
        }
        if self.short_ttl.is_zero() {
            return Err(Error::InvalidConfig(
                "short link ttl must be positive".to_string(),
            ));
        }
        if !(1..=MAX_SHORT_LENGTH).contains(&self.short_length) {
            return Err(Error::InvalidConfig(format!(
                "short link length must be between 1 and {MAX_SHORT_LENGTH}"
            )));
        }
        Ok(self)
    }

    #[must_use]
    pub fn site_addr(&self) -> &str {
        &self.site_addr
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    #[must_use]
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    #[must_use]
    pub fn csrf(&self) -> bool {
        self.csrf
    }

    #[must_use]
    pub fn short(&self) -> bool {
        self.short
    }

    #[must_use]
    pub fn short_ttl(&self) -> Duration {
        self.short_ttl
    }

    #[must_use]
    pub fn short_length(&self) -> usize {
        self.short_length
    }

    #[must_use]
    pub fn private_key(&self) -> Option<&SecretString> {
        self.private_key.as_ref()
    }

    /// Only mark cookies secure when the site is served over HTTPS.
    pub(crate) fn secure_cookies(&self) -> bool {
        self.site_addr.starts_with("https://")
    }

    /// Join `suffix` onto the base path.
    pub(crate) fn path(&self, suffix: &str) -> String {
        format!("{}/{}", self.base_path, suffix.trim_start_matches('/'))
    }
}

/// Lexically clean `path` and root it at `/`, returning `None` when nothing
/// but the root remains.
#[must_use]
pub fn normalize_base_path(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(format!("/{}", segments.join("/")))
    }
}
