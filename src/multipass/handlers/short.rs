use axum::{
    extract::{Extension, Path},
    response::Redirect,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::multipass::Multipass;

/// Follow a short link once. Unknown, used or expired codes land on the
/// landing page.
#[instrument(skip_all)]
pub async fn redeem(Path(code): Path<String>, multipass: Extension<Arc<Multipass>>) -> Redirect {
    match multipass.short_links().lookup(&code).await {
        Some(target) => Redirect::temporary(&target),
        None => {
            debug!("short link not found");
            Redirect::temporary(multipass.config().base_path())
        }
    }
}

pub async fn missing(multipass: Extension<Arc<Multipass>>) -> Redirect {
    Redirect::temporary(multipass.config().base_path())
}
