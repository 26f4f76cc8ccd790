//! Shared HTTP error mapping.

use axum::{
    extract::Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::error::CoreError;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidInput(msg) => ApiError::BadRequest(msg),
            CoreError::NotFound(id) => ApiError::NotFound(format!("sos alert {id}")),
            CoreError::StorageUnavailable(msg) => {
                tracing::error!(error = %msg, "storage unavailable");
                ApiError::ServiceUnavailable("storage unavailable".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_status_codes() {
        let cases = [
            (CoreError::InvalidInput("bad zone".into()), StatusCode::BAD_REQUEST),
            (CoreError::NotFound(9), StatusCode::NOT_FOUND),
            (
                CoreError::StorageUnavailable("disk gone".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (core, expected) in cases {
            let response = ApiError::from(core).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
