//! Publish endpoint (/api/publish)
//!
//! Accepts the composer's multipart submission, parses and validates it,
//! uploads the images to Cloudinary and fans the publication out to every
//! selected account. Per-platform failures come back inside the 200 result
//! envelope; only validation and upload failures abort the request.

use axum::{
    Json, Router,
    extract::{Multipart, State},
    routing::post,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

use crate::AppState;
use crate::dispatch::{self, Publication};
use crate::error::ApiError;
use crate::routes::dto::{ImageUpload, PlacementMap, PublishRequest, PublishResponse};
use crate::services::error::LogErr;

pub fn routes() -> Router<Arc<AppState>> {
    // Rate limit: publishing runs uploads plus a multi-account fan-out, so
    // keep bursts small
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(5)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("Failed to build rate limit config");

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config.into(),
    };

    Router::new()
        .route("/api/publish", post(publish))
        .layer(rate_limit_layer)
}

/// POST /api/publish - validate, upload media, fan out, report per platform
async fn publish(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<PublishResponse>, ApiError> {
    let request = parse_publish_form(multipart).await?;
    request.validate(Utc::now())?;

    let media_urls = dispatch::upload_media_set(&state.cloudinary, &request.images).await?;

    let publication = Publication {
        caption: request.text,
        media_urls,
        user_access_token: request.user_access_token,
        scheduled_publish_time: request.scheduled_publish_time,
    };

    let results = dispatch::dispatch_publication(
        &state.graph,
        &state.db,
        &publication,
        &request.accounts,
        &request.placements,
    )
    .await;

    Ok(Json(PublishResponse::new(results)))
}

/// Pull the composer's fields out of the multipart body. `placements` and
/// `accounts` arrive as JSON strings; unknown fields are ignored.
async fn parse_publish_form(mut multipart: Multipart) -> Result<PublishRequest, ApiError> {
    let mut text = String::new();
    let mut placements = PlacementMap::new();
    let mut accounts = Vec::new();
    let mut user_access_token = None;
    let mut scheduled_publish_time = None;
    let mut images = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .log_bad_request("malformed multipart body")?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => {
                text = field.text().await.log_bad_request("unreadable text field")?;
            }
            "placements" => {
                let raw = field
                    .text()
                    .await
                    .log_bad_request("unreadable placements field")?;
                placements = serde_json::from_str(&raw)
                    .log_bad_request("placements is not valid JSON")?;
            }
            "accounts" => {
                let raw = field
                    .text()
                    .await
                    .log_bad_request("unreadable accounts field")?;
                accounts =
                    serde_json::from_str(&raw).log_bad_request("accounts is not valid JSON")?;
            }
            "userAccessToken" => {
                user_access_token = Some(
                    field
                        .text()
                        .await
                        .log_bad_request("unreadable userAccessToken field")?,
                );
            }
            "scheduled_publish_time" => {
                let raw = field
                    .text()
                    .await
                    .log_bad_request("unreadable scheduled_publish_time field")?;
                let parsed = DateTime::parse_from_rfc3339(&raw)
                    .log_bad_request("scheduled_publish_time must be an RFC 3339 instant")?;
                scheduled_publish_time = Some(parsed.with_timezone(&Utc));
            }
            "files" => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let file_name = field.file_name().map(|s| s.to_string());
                let bytes = field.bytes().await.log_bad_request("unreadable file field")?;
                images.push(ImageUpload {
                    bytes,
                    content_type,
                    file_name,
                });
            }
            _ => {}
        }
    }

    Ok(PublishRequest {
        text,
        placements,
        accounts,
        user_access_token,
        scheduled_publish_time,
        images,
    })
}
