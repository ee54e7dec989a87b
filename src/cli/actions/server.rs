use crate::multipass::{self, middleware::HANDLE_HEADER, Config, IoHandleService, Multipass};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    routing::get,
    Router,
};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub site_addr: String,
    pub base_path: Option<String>,
    pub token_ttl: Duration,
    pub csrf: bool,
    pub short: bool,
    pub short_ttl: Duration,
    pub short_length: usize,
    pub resources: Vec<String>,
    pub handles: Vec<String>,
    pub protected_resources: Vec<String>,
    pub private_key: Option<SecretString>,
}

impl Args {
    fn config(&self) -> Config {
        let mut config = Config::new(&self.site_addr)
            .with_token_ttl(self.token_ttl)
            .with_csrf(self.csrf)
            .with_short(self.short)
            .with_short_ttl(self.short_ttl)
            .with_short_length(self.short_length);
        if let Some(base_path) = &self.base_path {
            config = config.with_base_path(base_path);
        }
        if !self.resources.is_empty() {
            config = config.with_resources(self.resources.iter().cloned());
        }
        if let Some(pem) = &self.private_key {
            config = config.with_private_key(pem.clone());
        }
        config
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if no usable key pair or configuration is available, or
/// the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let service = IoHandleService::stdout()
        .with_handles(args.handles.iter().cloned())
        .with_resources(args.protected_resources.iter().cloned());
    let multipass = Arc::new(
        Multipass::new(args.config())
            .context("Failed to initialize multipass")?
            .with_service(Arc::new(service)),
    );

    let app = app(Arc::clone(&multipass));

    let listener = TcpListener::bind(format!("::0:{}", args.port)).await?;

    info!("Listening on [::]:{}", args.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = multipass.close() {
        error!("Failed to close handle service: {e:#}");
    }
    crate::cli::telemetry::shutdown_tracer();

    Ok(())
}

/// Demo application guarded by multipass, with request ids and tracing.
pub fn app(multipass: Arc<Multipass>) -> Router {
    let protected = Router::new()
        .route("/", get(greet))
        .route("/private", get(greet));

    multipass::protect(protected, multipass).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span)),
    )
}

async fn greet(headers: HeaderMap) -> String {
    let handle = headers
        .get(HANDLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("stranger");
    format!("Hello {handle}\n")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        return;
    }
    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn log_startup_args(args: &Args) {
    let list = |values: &[String]| {
        if values.is_empty() {
            "none".to_string()
        } else {
            values.join(",")
        }
    };
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("site_addr", args.site_addr.clone()),
        (
            "base_path",
            args.base_path
                .clone()
                .unwrap_or_else(|| multipass::config::DEFAULT_BASE_PATH.to_string()),
        ),
        ("token_ttl_seconds", args.token_ttl.as_secs().to_string()),
        ("csrf", args.csrf.to_string()),
        ("short", args.short.to_string()),
        ("short_ttl_seconds", args.short_ttl.as_secs().to_string()),
        ("short_length", args.short_length.to_string()),
        ("resources", list(&args.resources)),
        ("handles", args.handles.len().to_string()),
        ("protected_resources", list(&args.protected_resources)),
        ("private_key_set", args.private_key.is_some().to_string()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "multipass {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    trimmed.chars().take(7).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            port: 8080,
            site_addr: "http://localhost:8080".to_string(),
            base_path: Some("auth/".to_string()),
            token_ttl: Duration::from_secs(60),
            csrf: false,
            short: false,
            short_ttl: Duration::from_secs(5),
            short_length: 10,
            resources: vec!["/private".to_string()],
            handles: vec!["leeloo@dallas".to_string()],
            protected_resources: vec!["/private".to_string()],
            private_key: None,
        }
    }

    #[test]
    fn test_args_config() {
        let config = args().config();
        assert_eq!(config.site_addr(), "http://localhost:8080");
        assert_eq!(config.base_path(), "/auth");
        assert_eq!(config.token_ttl(), Duration::from_secs(60));
        assert!(!config.csrf());
        assert!(!config.short());
        assert_eq!(config.short_ttl(), Duration::from_secs(5));
        assert_eq!(config.short_length(), 10);
        assert_eq!(config.resources(), ["/private".to_string()]);
        assert!(config.private_key().is_none());
    }

    #[test]
    fn test_args_config_keeps_default_resources() {
        let mut args = args();
        args.resources.clear();
        args.base_path = None;
        let config = args.config();
        assert_eq!(config.resources(), ["/".to_string()]);
        assert_eq!(config.base_path(), "/multipass");
    }

    #[test]
    fn test_short_commit() {
        assert_eq!(short_commit("0123456789abcdef"), "0123456");
        assert_eq!(short_commit(" abc "), "abc");
    }
}
