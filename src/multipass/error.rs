use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("malformed token")]
    Malformed,
    #[error("token expired")]
    Expired,
    #[error("handle not listed")]
    HandleNotListed,
    #[error("resource forbidden")]
    ResourceForbidden,
    #[error("short link code in use")]
    CodeInUse,
    #[error("notification failed: {0}")]
    NotifyFailed(String),
    #[error("key unavailable: {0}")]
    KeyUnavailable(String),
    #[error("signing failed: {0}")]
    SigningFailure(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Token and authorization errors are reported to clients as a single
    /// "invalid" outcome.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSignature | Self::Malformed | Self::Expired | Self::HandleNotListed
        )
    }
}
