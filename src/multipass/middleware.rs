//! Request guard for protected routes.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::{cookies, handlers::page_response, Multipass, Page};

/// Header carrying the authorized handle to downstream handlers.
pub const HANDLE_HEADER: &str = "multipass-handle";

/// Forward authorized requests with `Multipass-Handle` set. Anonymous or
/// invalid tokens get the login page with `401`, tokens lacking the resource
/// get `403`.
pub async fn require_auth(
    State(multipass): State<Arc<Multipass>>,
    mut request: Request,
    next: Next,
) -> Response {
    // Never trust a handle the client sent.
    request.headers_mut().remove(HANDLE_HEADER);

    let path = request.uri().path().to_string();
    let resource = request
        .uri()
        .path_and_query()
        .map_or_else(|| path.clone(), |pq| pq.as_str().to_string());
    let token = cookies::extract_token(request.headers(), request.uri().query());

    let decision = multipass.authorize(
        token.as_deref(),
        request.method().as_str(),
        &path,
        &resource,
    );
    debug!(
        status = %decision.status,
        authenticated = decision.authenticated,
        error = ?decision.error,
        "authorization decision"
    );

    if decision.status == StatusCode::FORBIDDEN {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    let handle = decision
        .handle
        .filter(|_| decision.status == StatusCode::OK)
        .and_then(|handle| HeaderValue::from_str(&handle).ok());
    let Some(handle) = handle else {
        let next_url = multipass.safe_next_url(Some(&resource));
        return page_response(&multipass, StatusCode::UNAUTHORIZED, Page::Login, next_url);
    };

    request.headers_mut().insert(HANDLE_HEADER, handle);
    next.run(request).await
}
