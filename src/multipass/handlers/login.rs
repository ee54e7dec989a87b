use axum::{
    extract::{Extension, Form, Query},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, instrument};

use super::csrf_passes;
use crate::multipass::{cookies, Multipass};

#[derive(Debug, Default, Deserialize)]
pub struct RedeemQuery {
    token: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    handle: Option<String>,
    url: Option<String>,
    csrf_token: Option<String>,
}

/// Install the token (and next URL) carried by a login link as cookies, then
/// return to the landing page.
#[instrument(skip_all)]
pub async fn redeem(
    Query(query): Query<RedeemQuery>,
    multipass: Extension<Arc<Multipass>>,
) -> Response {
    let secure = multipass.config().secure_cookies();
    let mut headers = HeaderMap::new();

    if let Some(token) = query.token.as_deref().filter(|t| !t.is_empty()) {
        match cookies::session_cookie(token, secure) {
            Ok(cookie) => {
                headers.append(SET_COOKIE, cookie);
            }
            Err(e) => {
                error!("Rejected login token: {e}");
                return StatusCode::BAD_REQUEST.into_response();
            }
        }
    }
    if let Some(next) = multipass.safe_next_url(query.url.as_deref()) {
        if let Ok(cookie) = cookies::next_url_cookie(&next, secure) {
            headers.append(SET_COOKIE, cookie);
        }
    }

    (headers, Redirect::to(multipass.config().base_path())).into_response()
}

/// Ask for a login link. The response is the same whether or not the handle
/// is known.
#[instrument(skip_all)]
pub async fn request_login(
    headers: HeaderMap,
    multipass: Extension<Arc<Multipass>>,
    Form(form): Form<LoginForm>,
) -> Response {
    if !csrf_passes(&multipass, &headers, form.csrf_token.as_deref()) {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    let handle = form.handle.as_deref().map(str::trim).unwrap_or_default();
    if handle.is_empty() {
        return Redirect::to(multipass.config().base_path()).into_response();
    }

    let next = multipass.safe_next_url(form.url.as_deref());
    // Delivery finishes in the background.
    let _ = multipass.request_login(handle, next.as_deref());

    Redirect::to(&multipass.config().path("confirm")).into_response()
}
