//! Error handling utilities for route handlers

use crate::error::ApiError;

/// Extension trait for logging errors and converting to ApiError
pub trait LogErr<T> {
    /// Log error with context and reject the request as a 400; the context
    /// and error message land in the response body
    fn log_bad_request(self, context: &str) -> Result<T, ApiError>;

    /// Log error with context and return a 502 carrying the upstream message
    fn log_upstream(self, context: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_bad_request(self, context: &str) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::warn!("{}: {}", context, e);
            ApiError::BadRequest(format!("{}: {}", context, e))
        })
    }

    fn log_upstream(self, context: &str) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::error!("{}: {}", context, e);
            ApiError::Upstream(e.to_string())
        })
    }
}
