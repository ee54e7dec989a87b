use axum::{
    extract::{Extension, Form},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::csrf_passes;
use crate::multipass::{cookies, Multipass};

#[derive(Debug, Default, Deserialize)]
pub struct SignoutForm {
    csrf_token: Option<String>,
}

/// Expire the session and next URL cookies and return to the landing page.
#[instrument(skip_all)]
pub async fn signout(
    headers: HeaderMap,
    multipass: Extension<Arc<Multipass>>,
    form: Option<Form<SignoutForm>>,
) -> Response {
    let submitted = form.as_ref().and_then(|Form(f)| f.csrf_token.as_deref());
    if !csrf_passes(&multipass, &headers, submitted) {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    // Always clear the cookies, even when no session was presented.
    let secure = multipass.config().secure_cookies();
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = cookies::clear_session_cookie(secure) {
        response_headers.append(SET_COOKIE, cookie);
    }
    if let Ok(cookie) = cookies::clear_next_url_cookie(secure) {
        response_headers.append(SET_COOKIE, cookie);
    }
    debug!("signed out");

    (response_headers, Redirect::to(multipass.config().base_path())).into_response()
}
