//! Published and scheduled post listings (/api/posts/query)
//!
//! Feeds the calendar view: for each account the published page posts, the
//! scheduled page posts and (when linked) the Instagram media are fetched
//! concurrently and returned as one flat list tagged with its origin. A
//! failing account is reported in `errors` without sinking the rest.

use axum::{Json, Router, extract::State, http::HeaderMap, routing::post};
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;

use super::bearer_token;
use crate::AppState;
use crate::constants::{FACEBOOK_POST_FIELDS, GRAPH_PAGE_LIMIT, INSTAGRAM_MEDIA_FIELDS};
use crate::error::ApiError;
use crate::routes::dto::{
    Account, AccountSummary, FetchError, Platform, PostEntry, PostsQuery, PostsResponse,
};
use crate::services::graph::{GraphClient, Result as GraphResult};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/posts/query", post(query_posts))
}

/// POST /api/posts/query - flat feed of every account's posts in a window
async fn query_posts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(query): Json<PostsQuery>,
) -> Result<Json<PostsResponse>, ApiError> {
    let user_token = bearer_token(&headers)
        .ok_or(ApiError::Unauthorized("missing bearer token"))?
        .to_string();

    let since = query.since.timestamp().to_string();
    let until = query.until.timestamp().to_string();

    let fetches = query
        .accounts
        .iter()
        .map(|account| fetch_account_posts(&state.graph, account, &user_token, &since, &until));
    let outcomes = join_all(fetches).await;

    let mut posts = Vec::new();
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(mut entries) => posts.append(&mut entries),
            Err(err) => errors.push(err),
        }
    }

    Ok(Json(PostsResponse { posts, errors }))
}

/// Fetch one account's three listings. Any listing failing fails the whole
/// account; the caller turns that into an `errors` entry.
async fn fetch_account_posts(
    graph: &GraphClient,
    account: &Account,
    user_token: &str,
    since: &str,
    until: &str,
) -> Result<Vec<PostEntry>, FetchError> {
    collect_account_posts(graph, account, user_token, since, until)
        .await
        .map_err(|err| {
            tracing::error!(
                "[posts] fetch failed for {}: {}",
                account.display_name(),
                err
            );
            FetchError {
                account_id: account.id.clone(),
                account_name: account.display_name().to_string(),
                message: err.to_string(),
            }
        })
}

async fn collect_account_posts(
    graph: &GraphClient,
    account: &Account,
    user_token: &str,
    since: &str,
    until: &str,
) -> GraphResult<Vec<PostEntry>> {
    let limit = GRAPH_PAGE_LIMIT.to_string();

    let published_path = format!("{}/posts", account.id);
    let published_params = [
        ("fields", FACEBOOK_POST_FIELDS),
        ("since", since),
        ("until", until),
        ("limit", limit.as_str()),
    ];
    let published_task =
        graph.get_all_pages(&published_path, &account.access_token, &published_params);

    let scheduled_path = format!("{}/scheduled_posts", account.id);
    let scheduled_params = [("fields", FACEBOOK_POST_FIELDS), ("limit", limit.as_str())];
    let scheduled_task =
        graph.get_all_pages(&scheduled_path, &account.access_token, &scheduled_params);

    // Instagram media exists only for accounts with a linked business id
    let instagram_task = async {
        match &account.instagram_business_account {
            Some(instagram) => {
                let media_path = format!("{}/media", instagram.id);
                let params = [
                    ("fields", INSTAGRAM_MEDIA_FIELDS),
                    ("since", since),
                    ("until", until),
                    ("limit", limit.as_str()),
                ];
                graph.get_all_pages(&media_path, user_token, &params).await
            }
            None => Ok(Vec::new()),
        }
    };

    let (published, scheduled, instagram) =
        tokio::join!(published_task, scheduled_task, instagram_task);

    let summary = AccountSummary::from(account);
    let mut entries = Vec::new();
    extend_entries(&mut entries, published?, Platform::Facebook, false, &summary);
    extend_entries(&mut entries, scheduled?, Platform::Facebook, true, &summary);
    extend_entries(&mut entries, instagram?, Platform::Instagram, false, &summary);

    Ok(entries)
}

fn extend_entries(
    entries: &mut Vec<PostEntry>,
    objects: Vec<Value>,
    platform: Platform,
    is_scheduled: bool,
    account: &AccountSummary,
) {
    for object in objects {
        let Value::Object(data) = object else { continue };
        entries.push(PostEntry {
            platform,
            is_scheduled,
            account: account.clone(),
            data,
        });
    }
}
