pub mod accounts;
pub mod dto;
pub mod posts;
pub mod publish;

use axum::{Router, http::HeaderMap, routing::get};
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(publish::routes())
        .merge(accounts::routes())
        .merge(posts::routes())
        .route("/health", get(health))
}

async fn health() -> &'static str {
    "ok"
}

/// Bearer token from the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
