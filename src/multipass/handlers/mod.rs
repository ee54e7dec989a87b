//! Login flow handlers and the helpers they share.

pub mod confirm;
pub mod login;
pub mod pubkey;
pub mod root;
pub mod short;
pub mod signout;

use axum::{
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tracing::error;

use super::{cookies, pages::Page, short::random_code, Multipass};

const CSRF_TOKEN_LENGTH: usize = 43;

/// Render `page` with `status`, issuing a fresh CSRF token when protection is
/// enabled.
pub(crate) fn page_response(
    multipass: &Multipass,
    status: StatusCode,
    page: Page,
    next_url: Option<String>,
) -> Response {
    let mut context = multipass.page_context(page, next_url);
    let mut headers = HeaderMap::new();

    let config = multipass.config();
    if config.csrf() && page != Page::TokenSent {
        let token = random_code(CSRF_TOKEN_LENGTH);
        match cookies::csrf_cookie(&token, config.base_path(), config.secure_cookies()) {
            Ok(cookie) => {
                headers.insert(SET_COOKIE, cookie);
                context.csrf_token = Some(token);
            }
            Err(e) => {
                error!("Failed to build CSRF cookie: {e}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    (status, headers, Html(multipass.render(&context))).into_response()
}

/// Double-submit check: the submitted field must equal the CSRF cookie.
pub(crate) fn csrf_passes(
    multipass: &Multipass,
    headers: &HeaderMap,
    submitted: Option<&str>,
) -> bool {
    if !multipass.config().csrf() {
        return true;
    }
    let (Some(cookie), Some(submitted)) = (
        cookies::cookie_value(headers, cookies::CSRF_COOKIE_NAME),
        submitted,
    ) else {
        return false;
    };
    cookie.as_bytes().ct_eq(submitted.as_bytes()).into()
}
