//! Management API errors

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced by the quota endpoint.
///
/// Per-account failures never reach this type; they are part of the report.
#[derive(Error, Debug)]
pub enum Error {
    #[error("credential store not configured")]
    StoreNotConfigured,

    #[error("credential store unavailable: {0}")]
    StoreUnavailable(#[from] antigravity_auth::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (StatusCode::SERVICE_UNAVAILABLE, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_are_503() {
        let response = Error::StoreNotConfigured.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response =
            Error::StoreUnavailable(antigravity_auth::Error::Io("disk gone".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn display_includes_cause() {
        let err = Error::StoreUnavailable(antigravity_auth::Error::Io("disk gone".into()));
        assert_eq!(
            err.to_string(),
            "credential store unavailable: I/O error: disk gone"
        );
    }
}
