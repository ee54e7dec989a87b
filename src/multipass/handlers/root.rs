use axum::{
    extract::{Extension, RawQuery},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::page_response;
use crate::multipass::{cookies, Multipass, Page, TokenState};

/// Landing page: log in, continue or sign out, or report an invalid token.
#[instrument(skip_all)]
pub async fn root(
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    multipass: Extension<Arc<Multipass>>,
) -> Response {
    let query = query.as_deref();
    let requested_next = query.and_then(|q| cookies::query_value(q, cookies::NEXT_URL_QUERY_PARAM));
    let token = cookies::extract_token(&headers, query);

    let (page, next_url) = match multipass.token_state(token.as_deref()) {
        TokenState::NoToken => (
            Page::Login,
            multipass.safe_next_url(requested_next.as_deref()),
        ),
        TokenState::Invalid(e) => {
            debug!("landing with invalid token: {e}");
            (
                Page::TokenInvalid,
                multipass.safe_next_url(requested_next.as_deref()),
            )
        }
        TokenState::Valid(_) => (
            Page::ContinueOrSignout,
            multipass.safe_next_url(cookies::next_url(&headers).as_deref()),
        ),
    };

    page_response(&multipass, StatusCode::OK, page, next_url)
}
