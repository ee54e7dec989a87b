//! # Multipass
//!
//! Possession-based authentication middleware for axum. Visitors log in by
//! proving they own a handle: they submit it, receive a login link through a
//! pluggable [`HandleService`], and following the link installs a PS512
//! signed token scoped to a set of resource path prefixes.
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::{routing::get, Router};
//! use multipass::{Config, IoHandleService, Multipass};
//!
//! # fn build() -> Result<Router, multipass::Error> {
//! let service = IoHandleService::stdout().with_handles(["leeloo@dallas"]);
//! let multipass = Multipass::new(
//!     Config::new("http://localhost:8080").with_resources(["/private"]),
//! )?
//! .with_service(Arc::new(service));
//!
//! let app = Router::new().route("/private", get(|| async { "hello" }));
//! Ok(multipass::protect(app, Arc::new(multipass)))
//! # }
//! ```
//!
//! The crate also ships the `multipass` binary, which serves a small demo
//! application behind the middleware.

pub mod cli;
pub mod multipass;

pub use crate::multipass::{
    protect, router, AuthDecision, Claims, ClaimsCodec, Config, DefaultTemplates, Error,
    HandleService, IoHandleService, KeyPair, Multipass, Page, PageContext, ShortLinkTable,
    Templates, TokenState,
};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
