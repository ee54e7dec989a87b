use axum::{extract::Extension, http::StatusCode, response::Response};
use std::sync::Arc;

use super::page_response;
use crate::multipass::{Multipass, Page};

/// "Check your messages" page shown after every login request.
pub async fn confirm(multipass: Extension<Arc<Multipass>>) -> Response {
    page_response(&multipass, StatusCode::OK, Page::TokenSent, None)
}
