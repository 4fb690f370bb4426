//! Unified error handling for the API surface.
//!
//! Every route handler returns `Result<T, ApiError>`; the error renders as
//! the `{"error": message}` JSON body the displays expect, with the legacy
//! status codes.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Application-level error type for the server.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or incomplete request.
    #[error("{0}")]
    BadRequest(String),

    /// Admin token missing or wrong.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// No such route.
    #[error("Not Found")]
    NotFound,

    /// Storage failed underneath a write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Storage details stay in the logs, not in responses
        let message = match &self {
            Self::Store(e) => {
                tracing::error!(error = %e, "storage error");
                "internal storage error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({"error": message}))).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                ApiError::BadRequest("Missing token".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Forbidden("invalid admin token".to_string()),
                StatusCode::FORBIDDEN,
            ),
            (ApiError::NotFound, StatusCode::NOT_FOUND),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_forbidden_message_carries_legacy_prefix() {
        let error = ApiError::Forbidden("invalid admin token".to_string());
        assert_eq!(error.to_string(), "Forbidden: invalid admin token");
    }

    #[tokio::test]
    async fn test_storage_details_not_exposed() {
        let io = std::io::Error::other("disk exploded");
        let response = ApiError::Store(StoreError::Io(io)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        let rendered: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(rendered, json!({"error": "internal storage error"}));
    }
}
