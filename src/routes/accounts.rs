//! Connected accounts listing (/api/accounts)

use axum::{Json, Router, extract::State, http::HeaderMap, routing::get};
use serde_json::Value;
use std::sync::Arc;

use super::bearer_token;
use crate::AppState;
use crate::constants::{ACCOUNT_FIELDS, GRAPH_PAGE_LIMIT};
use crate::error::ApiError;
use crate::services::error::LogErr;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/accounts", get(list_accounts))
}

/// GET /api/accounts - every Page the token manages, with page tokens,
/// pictures and linked Instagram accounts. Follows Graph cursors until the
/// listing is exhausted.
async fn list_accounts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Value>>, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError::Unauthorized("missing bearer token"))?;

    let limit = GRAPH_PAGE_LIMIT.to_string();
    let accounts = state
        .graph
        .get_all_pages(
            "me/accounts",
            token,
            &[("fields", ACCOUNT_FIELDS), ("limit", limit.as_str())],
        )
        .await
        .log_upstream("Account listing error")?;

    Ok(Json(accounts))
}
