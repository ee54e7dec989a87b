use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;

use crate::multipass::Multipass;

/// Public verification key in PEM encoding.
pub async fn public_key(multipass: Extension<Arc<Multipass>>) -> Response {
    match multipass.public_key_pem() {
        Ok(pem) => ([(CONTENT_TYPE, "application/pkix-cert")], pem).into_response(),
        Err(e) => {
            error!("Failed to export public key: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
