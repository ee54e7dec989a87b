//! # Multipass
//!
//! Possession-based authentication for axum applications. A visitor proves
//! they own a handle (an e-mail address, a phone number, ...) by following a
//! login link delivered to it. The link installs a signed token scoped to a
//! set of resource path prefixes, and every protected request is checked
//! against that token.
//!
//! ```text
//! no token ──> login page ──> POST login ──> link delivered ──> GET login?token=
//!                                                                    │
//! protected request <── session cookie <──────────────────────────────┘
//! ```
//!
//! - Tokens are PS512 signed JWTs; the public key is served at
//!   `{base}/pub.cer` so third parties can verify them offline.
//! - Login submissions never reveal whether a handle is known.
//! - Login links can be compacted into single-use short links that expire on
//!   their own.

pub mod config;
pub mod cookies;
pub mod error;
pub mod handlers;
pub mod keys;
pub mod middleware;
pub mod pages;
pub mod service;
pub mod short;
pub mod token;

#[cfg(test)]
pub(crate) mod testutil;

pub use self::config::Config;
pub use self::error::Error;
pub use self::keys::KeyPair;
pub use self::pages::{DefaultTemplates, Page, PageContext, Templates};
pub use self::service::{HandleService, IoHandleService};
pub use self::short::ShortLinkTable;
pub use self::token::{Claims, ClaimsCodec};

use axum::{
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Router,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use url::Url;

/// Where a request's token leaves it before resource checks.
#[derive(Debug)]
pub enum TokenState {
    NoToken,
    Invalid(Error),
    Valid(Claims),
}

/// Outcome of authorizing one request.
#[derive(Debug)]
pub struct AuthDecision {
    pub authenticated: bool,
    pub handle: Option<String>,
    pub status: StatusCode,
    pub error: Option<Error>,
}

impl AuthDecision {
    fn unauthorized(error: Option<Error>) -> Self {
        Self {
            authenticated: false,
            handle: None,
            status: StatusCode::UNAUTHORIZED,
            error,
        }
    }

    fn forbidden(handle: String) -> Self {
        Self {
            authenticated: true,
            handle: Some(handle),
            status: StatusCode::FORBIDDEN,
            error: Some(Error::ResourceForbidden),
        }
    }

    fn authorized(handle: String) -> Self {
        Self {
            authenticated: true,
            handle: Some(handle),
            status: StatusCode::OK,
            error: None,
        }
    }

    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.status == StatusCode::OK
    }
}

/// The authentication engine.
pub struct Multipass {
    config: Config,
    codec: ClaimsCodec,
    service: Arc<dyn HandleService>,
    templates: Arc<dyn Templates>,
    short_links: ShortLinkTable,
}

impl Multipass {
    /// Validate `config` and bootstrap the signing key pair.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` for a bad configuration and
    /// `Error::KeyUnavailable` if no usable key pair can be produced.
    pub fn new(config: Config) -> Result<Self, Error> {
        let config = config.validate()?;
        let keys = KeyPair::bootstrap(config.private_key())?;
        Ok(Self {
            config,
            codec: ClaimsCodec::new(Arc::new(keys)),
            service: Arc::new(IoHandleService::stdout()),
            templates: Arc::new(DefaultTemplates),
            short_links: ShortLinkTable::new(),
        })
    }

    #[must_use]
    pub fn with_service(mut self, service: Arc<dyn HandleService>) -> Self {
        self.service = service;
        self
    }

    #[must_use]
    pub fn with_templates(mut self, templates: Arc<dyn Templates>) -> Self {
        self.templates = templates;
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &ClaimsCodec {
        &self.codec
    }

    #[must_use]
    pub fn service(&self) -> &Arc<dyn HandleService> {
        &self.service
    }

    #[must_use]
    pub fn short_links(&self) -> &ShortLinkTable {
        &self.short_links
    }

    /// Mint a token for `handle` with the default resources and TTL. Callers
    /// must have checked that the handle is listed.
    ///
    /// # Errors
    /// Returns `Error::SigningFailure` if signing fails.
    pub fn access_token(&self, handle: &str) -> Result<String, Error> {
        let claims = Claims::new(
            handle,
            self.config.resources(),
            self.config.token_ttl(),
            Utc::now().timestamp(),
        );
        self.codec.issue(&claims)
    }

    /// Absolute `{site}{base}/login` URL carrying `token` and an optional next
    /// URL.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if the site address cannot be parsed.
    pub fn login_url(&self, token: &str, next_url: Option<&str>) -> Result<String, Error> {
        let mut url = self.site_url()?;
        url.set_path(&self.config.path("login"));
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            query.append_pair(cookies::TOKEN_QUERY_PARAM, token);
            if let Some(next) = next_url {
                query.append_pair(cookies::NEXT_URL_QUERY_PARAM, next);
            }
        }
        Ok(url.into())
    }

    /// Replace `login_url` with a single-use `{site}{base}/s/{code}` link.
    ///
    /// # Errors
    /// Returns `Error::CodeInUse` if no free code was found or
    /// `Error::InvalidConfig` if the site address cannot be parsed.
    pub async fn short_url(&self, login_url: &str) -> Result<String, Error> {
        let code = self
            .short_links
            .shorten(
                login_url,
                self.config.short_ttl(),
                self.config.short_length(),
            )
            .await?;
        let mut url = self.site_url()?;
        url.set_path(&self.config.path(&format!("s/{code}")));
        url.set_query(None);
        Ok(url.into())
    }

    fn site_url(&self) -> Result<Url, Error> {
        Url::parse(self.config.site_addr())
            .map_err(|e| Error::InvalidConfig(format!("site address: {e}")))
    }

    /// Verify `token` and check its handle is still listed. Every failure
    /// lands in `TokenState::Invalid`.
    #[must_use]
    pub fn token_state(&self, token: Option<&str>) -> TokenState {
        let Some(token) = token else {
            return TokenState::NoToken;
        };
        match self.codec.verify(token) {
            Err(e) => TokenState::Invalid(e),
            Ok(claims) if !self.service.listed(&claims.handle) => {
                TokenState::Invalid(Error::HandleNotListed)
            }
            Ok(claims) => TokenState::Valid(claims),
        }
    }

    /// Authorize a request for `path` (`resource` is the path and query handed
    /// to the handle service).
    #[must_use]
    pub fn authorize(
        &self,
        token: Option<&str>,
        method: &str,
        path: &str,
        resource: &str,
    ) -> AuthDecision {
        let claims = match self.token_state(token) {
            TokenState::NoToken => return AuthDecision::unauthorized(None),
            TokenState::Invalid(e) => return AuthDecision::unauthorized(Some(e)),
            TokenState::Valid(claims) => claims,
        };
        if !claims.authorizes(path) || !self.service.authorized(&claims.handle, method, resource)
        {
            return AuthDecision::forbidden(claims.handle);
        }
        AuthDecision::authorized(claims.handle)
    }

    /// Send a login link to `handle` if it is listed. The listed check,
    /// minting, shortening and delivery all run on a detached task, so the
    /// caller returns after the same work for known and unknown handles.
    /// The returned handle may be dropped.
    pub fn request_login(
        self: &Arc<Self>,
        handle: &str,
        next_url: Option<&str>,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let handle = handle.to_string();
        let next_url = next_url.map(ToString::to_string);
        tokio::spawn(async move {
            if let Err(e) = engine.deliver_login(handle, next_url).await {
                error!("Failed to deliver login link: {e}");
            }
        })
    }

    async fn deliver_login(
        self: Arc<Self>,
        handle: String,
        next_url: Option<String>,
    ) -> Result<(), Error> {
        let engine = Arc::clone(&self);
        let mint = move || -> Result<Option<(String, String)>, Error> {
            if !engine.service.listed(&handle) {
                debug!("login requested for unlisted handle");
                return Ok(None);
            }
            let token = engine.access_token(&handle)?;
            let login_url = engine.login_url(&token, next_url.as_deref())?;
            Ok(Some((handle, login_url)))
        };
        let minted = tokio::task::spawn_blocking(mint)
            .await
            .map_err(|e| Error::SigningFailure(e.to_string()))??;

        let Some((handle, login_url)) = minted else {
            return Ok(());
        };
        let login_url = if self.config.short() {
            self.short_url(&login_url).await?
        } else {
            login_url
        };

        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || service.notify(&handle, &login_url))
            .await
            .map_err(|e| Error::NotifyFailed(e.to_string()))?
            .map_err(|e| Error::NotifyFailed(format!("{e:#}")))
    }

    /// `candidate` if it can be offered as a next URL: non-empty and not
    /// pointing back into the auth routes, whether given as a path or as an
    /// absolute URL on this site.
    #[must_use]
    pub fn safe_next_url(&self, candidate: Option<&str>) -> Option<String> {
        let next = candidate.filter(|next| !next.is_empty())?;
        let path = match Url::parse(next) {
            Ok(url) if self.same_site(&url) => url.path().to_string(),
            Ok(_) => return Some(next.to_string()),
            Err(_) => next
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        };
        (!self.is_auth_path(&path)).then(|| next.to_string())
    }

    fn same_site(&self, url: &Url) -> bool {
        self.site_url().is_ok_and(|site| {
            site.scheme() == url.scheme()
                && site.host_str() == url.host_str()
                && site.port_or_known_default() == url.port_or_known_default()
        })
    }

    /// True for the base path itself and anything below it.
    fn is_auth_path(&self, path: &str) -> bool {
        let base = self.config.base_path();
        path.strip_prefix(base)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// # Errors
    /// Returns `Error::KeyUnavailable` if the key cannot be encoded.
    pub fn public_key_pem(&self) -> Result<String, Error> {
        self.codec.keys().public_key_pem()
    }

    #[must_use]
    pub fn render(&self, context: &PageContext) -> String {
        self.templates.render(context)
    }

    pub(crate) fn page_context(&self, page: Page, next_url: Option<String>) -> PageContext {
        PageContext {
            page,
            login_path: self.config.path("login"),
            signout_path: self.config.path("signout"),
            next_url,
            csrf_token: None,
        }
    }

    /// Tear down the handle service.
    ///
    /// # Errors
    /// Returns whatever the handle service reports.
    pub fn close(&self) -> anyhow::Result<()> {
        info!("Closing handle service");
        self.service.close()
    }
}

impl std::fmt::Debug for Multipass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multipass")
            .field("config", &self.config)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

/// Auth routes under the configured base path.
pub fn router(multipass: Arc<Multipass>) -> Router {
    let config = multipass.config();
    let base = config.base_path().to_string();

    let mut router = Router::new()
        .route(&base, get(handlers::root::root))
        .route(&format!("{base}/"), get(handlers::root::root))
        .route(
            &config.path("login"),
            get(handlers::login::redeem).post(handlers::login::request_login),
        )
        .route(&config.path("confirm"), get(handlers::confirm::confirm))
        .route(&config.path("signout"), post(handlers::signout::signout))
        .route(&config.path("pub.cer"), get(handlers::pubkey::public_key));

    if config.short() {
        router = router
            .route(&config.path("s/"), get(handlers::short::missing))
            .route(&config.path("s/:code"), get(handlers::short::redeem));
    }

    router.layer(Extension(multipass))
}

/// Guard every route of `app` and serve the auth routes next to it.
pub fn protect(app: Router, multipass: Arc<Multipass>) -> Router {
    app.layer(from_fn_with_state(
        Arc::clone(&multipass),
        middleware::require_auth,
    ))
    .merge(router(multipass))
}
