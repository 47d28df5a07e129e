//! Error types for credential and token operations

/// Errors from credential store access and OAuth token refresh.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("access token expired and no refresh token available")]
    NoRefreshToken,

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("token lifetime of {0}s is out of range")]
    InvalidExpiry(i64),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
