use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::error::SnapshotError;

/// Error returned by API handlers, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    /// The pipeline has not produced the requested file yet.
    SnapshotUnavailable(String),
    NotFound(String),
    Internal(String),
}

impl From<SnapshotError> for ApiError {
    fn from(e: SnapshotError) -> Self {
        if e.is_not_found() {
            ApiError::SnapshotUnavailable(format!("{e}; run the pipeline first"))
        } else {
            ApiError::Internal(e.to_string())
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("join error: {e}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::SnapshotUnavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => {
                error!(error = %m, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, m)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
