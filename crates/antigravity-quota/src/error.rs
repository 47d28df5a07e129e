//! Failure taxonomy for quota resolution
//!
//! Produced directly by HTTP status classification so the fallback policy
//! can match on kinds instead of error text.

/// Errors from quota endpoint calls and header probing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 401 from the quota API. The token is the problem, not the endpoint.
    #[error("unauthorized: access token expired")]
    Unauthorized,

    /// 403 from the quota API. Carries the response body.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// 404 from the quota API. The next candidate endpoint may work.
    #[error("404: endpoint not found")]
    NotFound,

    #[error("API returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    /// 200 whose body matched neither response format. Carries a preview.
    #[error("parse response: failed to parse as array or map format. Response: {0}")]
    Parse(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// Header probing found no usable rate-limit headers on any model.
    #[error("no quota information extracted from headers: {0}")]
    NoHeaderData(String),
}

impl Error {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unauthorized => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::NotFound => "not_found",
            Error::Upstream { .. } => "upstream",
            Error::Http(_) => "http",
            Error::Parse(_) => "parse",
            Error::RefreshFailed(_) => "refresh_failed",
            Error::NoHeaderData(_) => "no_header_data",
        }
    }
}

/// Result alias for quota operations.
pub type Result<T> = std::result::Result<T, Error>;
