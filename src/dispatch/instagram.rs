//! Instagram business-account publishing
//!
//! Instagram publishes in two steps: create a media container, then resolve
//! it with /media_publish. Scheduled submissions skip the second step and
//! are resolved later by the worker, so `publish` reports whether the
//! container was published now or deferred.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;

use super::DispatchError;
use crate::routes::dto::Placement;
use crate::services::graph::{self, GraphClient};

/// What happened to the media container
#[derive(Debug)]
pub enum Outcome {
    Published {
        media_id: String,
    },
    /// Container created but left unpublished until `publish_at`
    Deferred {
        container_id: String,
        publish_at: DateTime<Utc>,
    },
}

pub async fn publish(
    graph: &GraphClient,
    ig_user_id: &str,
    user_token: &str,
    placement: Placement,
    caption: &str,
    media_urls: &[String],
    schedule: Option<DateTime<Utc>>,
) -> Result<Outcome, DispatchError> {
    let container_id = match placement {
        Placement::Story => create_story_container(graph, ig_user_id, user_token, media_urls).await?,
        Placement::Feed => match media_urls.len() {
            0 => {
                return Err(DispatchError::Invalid(
                    "an Instagram post requires at least one image",
                ));
            }
            1 => {
                create_image_container(
                    graph,
                    ig_user_id,
                    user_token,
                    caption,
                    &media_urls[0],
                    schedule,
                )
                .await?
            }
            _ => {
                create_carousel_container(
                    graph,
                    ig_user_id,
                    user_token,
                    caption,
                    media_urls,
                    schedule,
                )
                .await?
            }
        },
    };

    match schedule {
        None => {
            let media_id = publish_container(graph, ig_user_id, user_token, &container_id).await?;
            Ok(Outcome::Published { media_id })
        }
        Some(publish_at) => Ok(Outcome::Deferred {
            container_id,
            publish_at,
        }),
    }
}

/// POST /{ig}/media for a single image
async fn create_image_container(
    graph: &GraphClient,
    ig_user_id: &str,
    user_token: &str,
    caption: &str,
    url: &str,
    schedule: Option<DateTime<Utc>>,
) -> Result<String, DispatchError> {
    let mut params = vec![
        ("image_url", url.to_string()),
        ("caption", caption.to_string()),
    ];
    push_schedule_param(&mut params, schedule);

    let body = graph
        .post_form(&format!("{}/media", ig_user_id), user_token, &params)
        .await?;
    Ok(graph::object_id(&body)?)
}

/// Create each child container, then the carousel parent referencing the
/// children in submitted order.
async fn create_carousel_container(
    graph: &GraphClient,
    ig_user_id: &str,
    user_token: &str,
    caption: &str,
    media_urls: &[String],
    schedule: Option<DateTime<Utc>>,
) -> Result<String, DispatchError> {
    let children = media_urls.iter().map(|url| async move {
        let params = [
            ("image_url", url.clone()),
            ("is_carousel_item", "true".to_string()),
        ];
        let body = graph
            .post_form(&format!("{}/media", ig_user_id), user_token, &params)
            .await?;
        graph::object_id(&body)
    });
    let child_ids = try_join_all(children).await?;

    let mut params = vec![
        ("media_type", "CAROUSEL".to_string()),
        ("children", child_ids.join(",")),
        ("caption", caption.to_string()),
    ];
    push_schedule_param(&mut params, schedule);

    let body = graph
        .post_form(&format!("{}/media", ig_user_id), user_token, &params)
        .await?;
    Ok(graph::object_id(&body)?)
}

/// Stories take the first image only; captions and scheduling are not
/// supported on the story surface.
async fn create_story_container(
    graph: &GraphClient,
    ig_user_id: &str,
    user_token: &str,
    media_urls: &[String],
) -> Result<String, DispatchError> {
    let url = media_urls
        .first()
        .ok_or(DispatchError::Invalid("a story requires at least one image"))?;

    let params = [
        ("media_type", "STORIES".to_string()),
        ("image_url", url.clone()),
    ];

    let body = graph
        .post_form(&format!("{}/media", ig_user_id), user_token, &params)
        .await?;
    Ok(graph::object_id(&body)?)
}

/// POST /{ig}/media_publish to make a container live
pub async fn publish_container(
    graph: &GraphClient,
    ig_user_id: &str,
    user_token: &str,
    container_id: &str,
) -> Result<String, DispatchError> {
    let params = [("creation_id", container_id.to_string())];
    let body = graph
        .post_form(&format!("{}/media_publish", ig_user_id), user_token, &params)
        .await?;
    Ok(graph::object_id(&body)?)
}

fn push_schedule_param(params: &mut Vec<(&'static str, String)>, schedule: Option<DateTime<Utc>>) {
    if let Some(when) = schedule {
        params.push(("scheduled_publish_time", when.timestamp().to_string()));
    }
}
