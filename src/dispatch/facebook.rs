//! Facebook Page publishing
//!
//! All calls authenticate with the page access token. Feed posts come in
//! three shapes (text-only, single photo, carousel); stories always publish
//! a single photo and ignore the caption, which the story surface does not
//! support.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde_json::json;

use super::DispatchError;
use crate::routes::dto::Placement;
use crate::services::graph::{self, GraphClient};

pub async fn publish(
    graph: &GraphClient,
    page_id: &str,
    page_token: &str,
    placement: Placement,
    caption: &str,
    media_urls: &[String],
    schedule: Option<DateTime<Utc>>,
) -> Result<String, DispatchError> {
    match placement {
        Placement::Story => publish_story(graph, page_id, page_token, media_urls, schedule).await,
        Placement::Feed => match media_urls.len() {
            0 => publish_text(graph, page_id, page_token, caption, schedule).await,
            1 => {
                publish_photo(graph, page_id, page_token, caption, &media_urls[0], schedule).await
            }
            _ => publish_carousel(graph, page_id, page_token, caption, media_urls, schedule).await,
        },
    }
}

/// POST /{page}/feed with just a message
async fn publish_text(
    graph: &GraphClient,
    page_id: &str,
    page_token: &str,
    caption: &str,
    schedule: Option<DateTime<Utc>>,
) -> Result<String, DispatchError> {
    let mut params = vec![("message", caption.to_string())];
    push_schedule_params(&mut params, schedule);

    let body = graph
        .post_form(&format!("{}/feed", page_id), page_token, &params)
        .await?;
    Ok(graph::object_id(&body)?)
}

/// POST /{page}/photos with a hosted image URL
async fn publish_photo(
    graph: &GraphClient,
    page_id: &str,
    page_token: &str,
    caption: &str,
    url: &str,
    schedule: Option<DateTime<Utc>>,
) -> Result<String, DispatchError> {
    let mut params = vec![("url", url.to_string()), ("caption", caption.to_string())];
    push_schedule_params(&mut params, schedule);

    let body = graph
        .post_form(&format!("{}/photos", page_id), page_token, &params)
        .await?;
    Ok(graph::object_id(&body)?)
}

/// Upload each photo unpublished, then attach them all to one feed post.
/// The attachment order follows the submitted media order.
async fn publish_carousel(
    graph: &GraphClient,
    page_id: &str,
    page_token: &str,
    caption: &str,
    media_urls: &[String],
    schedule: Option<DateTime<Utc>>,
) -> Result<String, DispatchError> {
    let uploads = media_urls.iter().map(|url| async move {
        let params = [
            ("url", url.clone()),
            ("published", "false".to_string()),
        ];
        let body = graph
            .post_form(&format!("{}/photos", page_id), page_token, &params)
            .await?;
        graph::object_id(&body)
    });
    let photo_ids = try_join_all(uploads).await?;

    let attached: Vec<_> = photo_ids
        .iter()
        .map(|id| json!({"media_fbid": id}))
        .collect();

    let mut params = vec![
        ("message", caption.to_string()),
        (
            "attached_media",
            serde_json::Value::Array(attached).to_string(),
        ),
    ];
    push_schedule_params(&mut params, schedule);

    let body = graph
        .post_form(&format!("{}/feed", page_id), page_token, &params)
        .await?;
    Ok(graph::object_id(&body)?)
}

/// Stories take exactly one photo and no caption
async fn publish_story(
    graph: &GraphClient,
    page_id: &str,
    page_token: &str,
    media_urls: &[String],
    schedule: Option<DateTime<Utc>>,
) -> Result<String, DispatchError> {
    let url = media_urls
        .first()
        .ok_or(DispatchError::Invalid("a story requires at least one image"))?;

    let mut params = vec![("url", url.clone())];
    push_schedule_params(&mut params, schedule);

    let body = graph
        .post_form(&format!("{}/photos", page_id), page_token, &params)
        .await?;
    Ok(graph::object_id(&body)?)
}

/// Scheduled posts are created unpublished with a unix publish time; for
/// immediate posts neither key is sent.
fn push_schedule_params(params: &mut Vec<(&'static str, String)>, schedule: Option<DateTime<Utc>>) {
    if let Some(when) = schedule {
        params.push(("published", "false".to_string()));
        params.push(("scheduled_publish_time", when.timestamp().to_string()));
    }
}
