//! Request-level error type for the publish API

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::cloudinary::CloudinaryError;

/// Errors that abort a request as a whole. Per-platform Graph failures are
/// not represented here; those are isolated into the dispatch results.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    /// A media upload failed, aborting the whole submission
    #[error("media upload failed: {0}")]
    Upload(#[from] CloudinaryError),

    /// Graph failure on a read path, reported with the upstream message
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response()
            }
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, Json(json!({"error": message}))).into_response()
            }
            ApiError::Upload(err) => {
                tracing::error!("media upload failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "media upload failed",
                        "details": err.to_string(),
                    })),
                )
                    .into_response()
            }
            ApiError::Upstream(message) => {
                (StatusCode::BAD_GATEWAY, Json(json!({"error": message}))).into_response()
            }
        }
    }
}
