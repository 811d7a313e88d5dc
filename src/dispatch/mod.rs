//! Publish dispatch
//!
//! Fans a validated submission out to every selected account. Accounts run
//! concurrently and results come back in submission order; within an account
//! the two platforms run concurrently and independently, so one platform
//! failing never touches the other. Nothing here aborts the request: every
//! failure lands in the per-platform result for the UI to display.

pub mod facebook;
pub mod instagram;

use chrono::{DateTime, Utc};
use futures::future::{join_all, try_join_all};
use sqlx::PgPool;
use thiserror::Error;

use crate::domain::scheduled_posts::{self, NewScheduledPost};
use crate::error::ApiError;
use crate::routes::dto::{
    Account, AccountResult, ImageUpload, Placement, PlacementMap, PlacementSelection,
    PlatformResult,
};
use crate::services::cloudinary::CloudinaryClient;
use crate::services::graph::{GraphClient, GraphError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("scheduled post was not recorded: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("{0}")]
    Invalid(&'static str),
}

/// One submission, resolved to hosted media and ready to fan out
#[derive(Debug, Clone)]
pub struct Publication {
    pub caption: String,
    pub media_urls: Vec<String>,
    pub user_access_token: Option<String>,
    pub scheduled_publish_time: Option<DateTime<Utc>>,
}

/// Upload every image to Cloudinary concurrently. The returned URLs are in
/// submission order; a single failed upload aborts the whole submission.
pub async fn upload_media_set(
    cloudinary: &CloudinaryClient,
    images: &[ImageUpload],
) -> Result<Vec<String>, ApiError> {
    let uploads = images.iter().enumerate().map(|(index, image)| async move {
        let fallback = format!("image-{}", index);
        let name = image.file_name.as_deref().unwrap_or(&fallback);
        cloudinary
            .upload_image(&image.bytes, &image.content_type, name)
            .await
    });

    Ok(try_join_all(uploads).await?)
}

/// Publish to every selected account concurrently. The result order follows
/// the submitted account order regardless of completion order.
pub async fn dispatch_publication(
    graph: &GraphClient,
    db: &PgPool,
    publication: &Publication,
    accounts: &[Account],
    placements: &PlacementMap,
) -> Vec<AccountResult> {
    let tasks = accounts.iter().map(|account| {
        let selection = placements.get(&account.id).copied().unwrap_or_default();
        publish_to_account(graph, db, publication, account, selection)
    });

    join_all(tasks).await
}

/// Run both platform attempts for one account. A platform that was not
/// selected (or, for Instagram, has no linked business account) stays `None`
/// in the result.
async fn publish_to_account(
    graph: &GraphClient,
    db: &PgPool,
    publication: &Publication,
    account: &Account,
    selection: PlacementSelection,
) -> AccountResult {
    let facebook_task = async {
        let placement = selection.facebook?;
        Some(facebook_attempt(graph, publication, account, placement).await)
    };

    let instagram_task = async {
        let placement = selection.instagram?;
        let instagram = account.instagram_business_account.as_ref()?;
        Some(instagram_attempt(graph, db, publication, &instagram.id, placement).await)
    };

    let (facebook, instagram) = tokio::join!(facebook_task, instagram_task);

    AccountResult {
        account_name: account.display_name().to_string(),
        facebook,
        instagram,
    }
}

async fn facebook_attempt(
    graph: &GraphClient,
    publication: &Publication,
    account: &Account,
    placement: Placement,
) -> PlatformResult {
    let attempt = facebook::publish(
        graph,
        &account.id,
        &account.access_token,
        placement,
        &publication.caption,
        &publication.media_urls,
        publication.scheduled_publish_time,
    )
    .await;

    match attempt {
        Ok(post_id) => {
            tracing::info!(
                "[dispatch] facebook post {} created for {}",
                post_id,
                account.display_name()
            );
            PlatformResult::ok()
        }
        Err(err) => {
            tracing::error!(
                "[dispatch] facebook publish failed for {}: {}",
                account.display_name(),
                err
            );
            PlatformResult::failed(err.to_string())
        }
    }
}

async fn instagram_attempt(
    graph: &GraphClient,
    db: &PgPool,
    publication: &Publication,
    ig_user_id: &str,
    placement: Placement,
) -> PlatformResult {
    let Some(token) = publication.user_access_token.as_deref() else {
        return PlatformResult::failed("Instagram publishing requires the user access token");
    };

    let attempt = instagram::publish(
        graph,
        ig_user_id,
        token,
        placement,
        &publication.caption,
        &publication.media_urls,
        publication.scheduled_publish_time,
    )
    .await;

    match attempt {
        Ok(instagram::Outcome::Published { media_id }) => {
            tracing::info!(
                "[dispatch] instagram media {} published for {}",
                media_id,
                ig_user_id
            );
            PlatformResult::ok()
        }
        Ok(instagram::Outcome::Deferred {
            container_id,
            publish_at,
        }) => {
            let record = schedule_record(ig_user_id, &container_id, token, publication, publish_at);
            match scheduled_posts::insert(db, &record).await {
                Ok(row_id) => {
                    tracing::info!(
                        "[dispatch] instagram container {} scheduled as row {}",
                        container_id,
                        row_id
                    );
                    PlatformResult::ok()
                }
                Err(err) => {
                    // Not rolled back; Graph has no container delete, and
                    // unpublished containers lapse upstream on their own.
                    tracing::error!(
                        "[dispatch] failed to record scheduled post for container {}: {}",
                        container_id,
                        err
                    );
                    PlatformResult::failed(DispatchError::Persistence(err).to_string())
                }
            }
        }
        Err(err) => {
            tracing::error!(
                "[dispatch] instagram publish failed for {}: {}",
                ig_user_id,
                err
            );
            PlatformResult::failed(err.to_string())
        }
    }
}

/// Row persisted for a deferred container; the worker republishes from it
fn schedule_record(
    ig_user_id: &str,
    container_id: &str,
    token: &str,
    publication: &Publication,
    publish_at: DateTime<Utc>,
) -> NewScheduledPost {
    NewScheduledPost {
        ig_user_id: ig_user_id.to_string(),
        container_id: container_id.to_string(),
        caption: publication.caption.clone(),
        media_urls: publication.media_urls.clone(),
        publish_at,
        access_token: token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::dto::InstagramAccount;
    use crate::test_support::{
        CallLog, Responder, cloudinary_stub, graph_stub, spawn_server, unreachable_pool, upload_ok,
    };
    use bytes::Bytes;
    use chrono::Duration;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn account(id: &str, name: &str, token: &str, ig: Option<&str>) -> Account {
        Account {
            id: id.to_string(),
            name: Some(name.to_string()),
            access_token: token.to_string(),
            picture: None,
            instagram_business_account: ig.map(|ig_id| InstagramAccount {
                id: ig_id.to_string(),
                username: None,
                name: None,
            }),
        }
    }

    fn selection(facebook: Option<Placement>, instagram: Option<Placement>) -> PlacementSelection {
        PlacementSelection {
            facebook,
            instagram,
        }
    }

    fn publication(caption: &str, media_urls: &[&str]) -> Publication {
        Publication {
            caption: caption.to_string(),
            media_urls: media_urls.iter().map(|s| s.to_string()).collect(),
            user_access_token: Some("user-token".to_string()),
            scheduled_publish_time: None,
        }
    }

    async fn graph_client(log: CallLog, respond: Responder) -> GraphClient {
        let base = spawn_server(graph_stub(log, respond)).await;
        GraphClient::with_base_url(base)
    }

    /// Responder minting object ids from the image URL, so tests can tell
    /// exactly which upload produced which id.
    fn id_from_image_url(field: &'static str, prefix: &'static str) -> Responder {
        Arc::new(move |call| {
            let stem = call
                .form
                .get(field)
                .and_then(|u| u.rsplit('/').next())
                .and_then(|n| n.split('.').next())
                .unwrap_or("x");
            json!({"id": format!("{}-{}", prefix, stem)})
        })
    }

    fn images(count: usize) -> Vec<ImageUpload> {
        (0..count)
            .map(|i| ImageUpload {
                bytes: Bytes::from_static(b"pixels"),
                content_type: "image/png".to_string(),
                file_name: Some(format!("{}.png", i)),
            })
            .collect()
    }

    // ========================================================================
    // Media uploads
    // ========================================================================

    #[tokio::test]
    async fn uploads_preserve_submission_order_under_reversed_completion() {
        let log = CallLog::default();
        let base = spawn_server(cloudinary_stub(log.clone(), true, upload_ok())).await;
        let client =
            CloudinaryClient::with_upload_url(format!("{}/image/upload", base), "key", "secret");

        let urls = upload_media_set(&client, &images(3)).await.unwrap();

        // The stub completes higher indexes first; order must still hold.
        assert_eq!(
            urls,
            vec![
                "https://media.test/0.png",
                "https://media.test/1.png",
                "https://media.test/2.png",
            ]
        );
        assert_eq!(log.calls().len(), 3);
    }

    #[tokio::test]
    async fn one_failed_upload_aborts_the_submission() {
        let log = CallLog::default();
        let respond = Arc::new(|file_name: &str| {
            if file_name == "1.png" {
                json!({"error": {"message": "Invalid image file"}})
            } else {
                json!({"secure_url": format!("https://media.test/{}", file_name)})
            }
        });
        let base = spawn_server(cloudinary_stub(log.clone(), false, respond)).await;
        let client =
            CloudinaryClient::with_upload_url(format!("{}/image/upload", base), "key", "secret");

        let err = upload_media_set(&client, &images(3)).await.unwrap_err();
        assert!(matches!(err, ApiError::Upload(_)));
    }

    // ========================================================================
    // Facebook sequences
    // ========================================================================

    #[tokio::test]
    async fn text_only_facebook_feed_sends_a_single_message_call() {
        let log = CallLog::default();
        let graph = graph_client(log.clone(), Arc::new(|_| json!({"id": "post_1"}))).await;
        let db = unreachable_pool();

        let accounts = vec![account("page_1", "Page One", "page-token", None)];
        let placements: PlacementMap =
            [("page_1".to_string(), selection(Some(Placement::Feed), None))].into();

        let results = dispatch_publication(
            &graph,
            &db,
            &publication("hello", &[]),
            &accounts,
            &placements,
        )
        .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].account_name, "Page One");
        assert!(results[0].facebook.as_ref().unwrap().success);
        assert!(results[0].instagram.is_none());

        let calls = log.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "page_1/feed");
        assert_eq!(calls[0].query.get("access_token").unwrap(), "page-token");
        assert_eq!(calls[0].form.get("message").unwrap(), "hello");
        // Immediate posts carry no scheduling keys at all
        assert!(!calls[0].form.contains_key("published"));
        assert!(!calls[0].form.contains_key("scheduled_publish_time"));
    }

    #[tokio::test]
    async fn single_image_facebook_feed_posts_one_captioned_photo() {
        let log = CallLog::default();
        let graph = graph_client(log.clone(), Arc::new(|_| json!({"id": "photo_1"}))).await;
        let db = unreachable_pool();

        let accounts = vec![account("page_1", "Page One", "page-token", None)];
        let placements: PlacementMap =
            [("page_1".to_string(), selection(Some(Placement::Feed), None))].into();

        let results = dispatch_publication(
            &graph,
            &db,
            &publication("look", &["https://media.test/0.png"]),
            &accounts,
            &placements,
        )
        .await;

        assert!(results[0].facebook.as_ref().unwrap().success);

        let calls = log.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "page_1/photos");
        assert_eq!(calls[0].form.get("url").unwrap(), "https://media.test/0.png");
        assert_eq!(calls[0].form.get("caption").unwrap(), "look");
    }

    #[tokio::test]
    async fn facebook_carousel_uploads_children_then_attaches_in_order() {
        let log = CallLog::default();
        let respond: Responder = {
            let mint = id_from_image_url("url", "photo");
            Arc::new(move |call| {
                if call.path.ends_with("/feed") {
                    json!({"id": "post_9"})
                } else {
                    mint(call)
                }
            })
        };
        let graph = graph_client(log.clone(), respond).await;
        let db = unreachable_pool();

        let accounts = vec![account("page_1", "Page One", "page-token", None)];
        let placements: PlacementMap =
            [("page_1".to_string(), selection(Some(Placement::Feed), None))].into();

        let media = [
            "https://media.test/0.png",
            "https://media.test/1.png",
            "https://media.test/2.png",
        ];
        let results = dispatch_publication(
            &graph,
            &db,
            &publication("three images", &media),
            &accounts,
            &placements,
        )
        .await;

        assert!(results[0].facebook.as_ref().unwrap().success);

        let calls = log.calls();
        assert_eq!(calls.len(), 4);
        // All three children land before the feed post
        for call in &calls[..3] {
            assert_eq!(call.path, "page_1/photos");
            assert_eq!(call.form.get("published").unwrap(), "false");
        }
        let feed = &calls[3];
        assert_eq!(feed.path, "page_1/feed");
        assert_eq!(feed.form.get("message").unwrap(), "three images");

        // Attachment order follows media order, not upload completion order
        let attached: Value =
            serde_json::from_str(feed.form.get("attached_media").unwrap()).unwrap();
        assert_eq!(
            attached,
            json!([
                {"media_fbid": "photo-0"},
                {"media_fbid": "photo-1"},
                {"media_fbid": "photo-2"},
            ])
        );
    }

    #[tokio::test]
    async fn facebook_schedule_keys_go_on_the_triggering_call_only() {
        let log = CallLog::default();
        let respond: Responder = {
            let mint = id_from_image_url("url", "photo");
            Arc::new(move |call| {
                if call.path.ends_with("/feed") {
                    json!({"id": "post_9"})
                } else {
                    mint(call)
                }
            })
        };
        let graph = graph_client(log.clone(), respond).await;
        let db = unreachable_pool();

        let when = Utc::now() + Duration::hours(2);
        let mut publication = publication(
            "later",
            &["https://media.test/0.png", "https://media.test/1.png"],
        );
        publication.scheduled_publish_time = Some(when);

        let accounts = vec![account("page_1", "Page One", "page-token", None)];
        let placements: PlacementMap =
            [("page_1".to_string(), selection(Some(Placement::Feed), None))].into();

        dispatch_publication(&graph, &db, &publication, &accounts, &placements).await;

        let calls = log.calls();
        assert_eq!(calls.len(), 3);
        // Children stay unpublished but carry no schedule of their own
        for call in &calls[..2] {
            assert_eq!(call.form.get("published").unwrap(), "false");
            assert!(!call.form.contains_key("scheduled_publish_time"));
        }
        let feed = &calls[2];
        assert_eq!(feed.form.get("published").unwrap(), "false");
        assert_eq!(
            feed.form.get("scheduled_publish_time").unwrap(),
            &when.timestamp().to_string()
        );
    }

    #[tokio::test]
    async fn facebook_story_posts_the_first_image_without_caption() {
        let log = CallLog::default();
        let graph = graph_client(log.clone(), Arc::new(|_| json!({"id": "story_1"}))).await;
        let db = unreachable_pool();

        let accounts = vec![account("page_1", "Page One", "page-token", None)];
        let placements: PlacementMap =
            [("page_1".to_string(), selection(Some(Placement::Story), None))].into();

        let results = dispatch_publication(
            &graph,
            &db,
            &publication("ignored", &["https://media.test/0.png", "https://media.test/1.png"]),
            &accounts,
            &placements,
        )
        .await;

        assert!(results[0].facebook.as_ref().unwrap().success);

        let calls = log.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "page_1/photos");
        assert_eq!(calls[0].form.get("url").unwrap(), "https://media.test/0.png");
        assert!(!calls[0].form.contains_key("caption"));
    }

    #[tokio::test]
    async fn story_without_images_fails_without_any_network_call() {
        let log = CallLog::default();
        let graph = graph_client(log.clone(), Arc::new(|_| json!({"id": "x"}))).await;
        let db = unreachable_pool();

        let accounts = vec![account("page_1", "Page One", "page-token", None)];
        let placements: PlacementMap =
            [("page_1".to_string(), selection(Some(Placement::Story), None))].into();

        let results =
            dispatch_publication(&graph, &db, &publication("hello", &[]), &accounts, &placements)
                .await;

        let facebook = results[0].facebook.as_ref().unwrap();
        assert!(!facebook.success);
        assert!(facebook.error.as_ref().unwrap().contains("at least one image"));
        assert!(log.calls().is_empty());
    }

    // ========================================================================
    // Instagram sequences
    // ========================================================================

    #[tokio::test]
    async fn instagram_single_image_creates_then_publishes_a_container() {
        let log = CallLog::default();
        let respond: Responder = Arc::new(|call| {
            if call.path.ends_with("/media_publish") {
                json!({"id": "media_9"})
            } else {
                json!({"id": "container_1"})
            }
        });
        let graph = graph_client(log.clone(), respond).await;
        let db = unreachable_pool();

        let accounts = vec![account("page_1", "Page One", "page-token", Some("ig_1"))];
        let placements: PlacementMap =
            [("page_1".to_string(), selection(None, Some(Placement::Feed)))].into();

        let results = dispatch_publication(
            &graph,
            &db,
            &publication("hello", &["https://media.test/0.png"]),
            &accounts,
            &placements,
        )
        .await;

        assert!(results[0].facebook.is_none());
        assert!(results[0].instagram.as_ref().unwrap().success);

        assert_eq!(log.paths(), vec!["ig_1/media", "ig_1/media_publish"]);
        let calls = log.calls();
        // Instagram always uses the user token, never the page token
        assert_eq!(calls[0].query.get("access_token").unwrap(), "user-token");
        assert_eq!(calls[0].form.get("image_url").unwrap(), "https://media.test/0.png");
        assert_eq!(calls[0].form.get("caption").unwrap(), "hello");
        assert!(!calls[0].form.contains_key("scheduled_publish_time"));
        assert_eq!(calls[1].form.get("creation_id").unwrap(), "container_1");
    }

    #[tokio::test]
    async fn instagram_story_uses_first_image_and_no_caption() {
        let log = CallLog::default();
        let respond: Responder = Arc::new(|call| {
            if call.path.ends_with("/media_publish") {
                json!({"id": "media_9"})
            } else {
                json!({"id": "container_7"})
            }
        });
        let graph = graph_client(log.clone(), respond).await;
        let db = unreachable_pool();

        let accounts = vec![account("page_1", "Page One", "page-token", Some("ig_1"))];
        let placements: PlacementMap =
            [("page_1".to_string(), selection(None, Some(Placement::Story)))].into();

        let results = dispatch_publication(
            &graph,
            &db,
            &publication("ignored", &["https://media.test/0.png", "https://media.test/1.png"]),
            &accounts,
            &placements,
        )
        .await;

        assert!(results[0].instagram.as_ref().unwrap().success);

        let calls = log.calls();
        assert_eq!(calls[0].path, "ig_1/media");
        assert_eq!(calls[0].form.get("media_type").unwrap(), "STORIES");
        assert_eq!(calls[0].form.get("image_url").unwrap(), "https://media.test/0.png");
        assert!(!calls[0].form.contains_key("caption"));
    }

    #[tokio::test]
    async fn scheduled_instagram_carousel_defers_and_skips_media_publish() {
        let log = CallLog::default();
        let respond: Responder = {
            let mint = id_from_image_url("image_url", "child");
            Arc::new(move |call| {
                if call.form.get("is_carousel_item").map(String::as_str) == Some("true") {
                    mint(call)
                } else {
                    json!({"id": "parent_1"})
                }
            })
        };
        let graph = graph_client(log.clone(), respond).await;
        let db = unreachable_pool();

        let when = Utc::now() + Duration::hours(3);
        let mut publication = publication(
            "later",
            &["https://media.test/0.png", "https://media.test/1.png"],
        );
        publication.scheduled_publish_time = Some(when);

        let accounts = vec![account("page_1", "Page One", "page-token", Some("ig_9"))];
        let placements: PlacementMap =
            [("page_1".to_string(), selection(None, Some(Placement::Feed)))].into();

        let results =
            dispatch_publication(&graph, &db, &publication, &accounts, &placements).await;

        let calls = log.calls();
        assert_eq!(calls.len(), 3);
        assert!(log.paths().iter().all(|p| p == "ig_9/media"));

        // Children first, then the parent referencing them in media order
        let parent = &calls[2];
        assert_eq!(parent.form.get("media_type").unwrap(), "CAROUSEL");
        assert_eq!(parent.form.get("children").unwrap(), "child-0,child-1");
        assert_eq!(parent.form.get("caption").unwrap(), "later");
        assert_eq!(
            parent.form.get("scheduled_publish_time").unwrap(),
            &when.timestamp().to_string()
        );

        // Deferred: no media_publish, and with the record insert failing the
        // platform result carries the persistence error.
        let instagram = results[0].instagram.as_ref().unwrap();
        assert!(!instagram.success);
        assert!(instagram.error.as_ref().unwrap().contains("not recorded"));
    }

    #[tokio::test]
    async fn instagram_feed_without_images_fails_without_any_network_call() {
        let log = CallLog::default();
        let graph = graph_client(log.clone(), Arc::new(|_| json!({"id": "x"}))).await;
        let db = unreachable_pool();

        let accounts = vec![account("page_1", "Page One", "page-token", Some("ig_1"))];
        let placements: PlacementMap =
            [("page_1".to_string(), selection(None, Some(Placement::Feed)))].into();

        let results =
            dispatch_publication(&graph, &db, &publication("text", &[]), &accounts, &placements)
                .await;

        let instagram = results[0].instagram.as_ref().unwrap();
        assert!(!instagram.success);
        assert!(instagram.error.as_ref().unwrap().contains("at least one image"));
        assert!(log.calls().is_empty());
    }

    // ========================================================================
    // Isolation and skipping
    // ========================================================================

    #[tokio::test]
    async fn one_account_failing_never_touches_the_other() {
        let log = CallLog::default();
        let respond: Responder = Arc::new(|call| {
            if call.path.starts_with("acc_a/") {
                json!({"error": {"code": 1, "message": "page quota exhausted"}})
            } else {
                json!({"id": "ok_1"})
            }
        });
        let graph = graph_client(log.clone(), respond).await;
        let db = unreachable_pool();

        let accounts = vec![
            account("acc_a", "Alpha", "token-a", None),
            account("acc_b", "Beta", "token-b", None),
        ];
        let placements: PlacementMap = [
            ("acc_a".to_string(), selection(Some(Placement::Feed), None)),
            ("acc_b".to_string(), selection(Some(Placement::Feed), None)),
        ]
        .into();

        let results =
            dispatch_publication(&graph, &db, &publication("hi", &[]), &accounts, &placements)
                .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].account_name, "Alpha");
        let alpha = results[0].facebook.as_ref().unwrap();
        assert!(!alpha.success);
        assert!(alpha.error.as_ref().unwrap().contains("page quota exhausted"));

        assert_eq!(results[1].account_name, "Beta");
        assert!(results[1].facebook.as_ref().unwrap().success);
    }

    #[tokio::test]
    async fn platform_failure_stays_isolated_within_an_account() {
        let log = CallLog::default();
        let respond: Responder = Arc::new(|call| {
            if call.path.ends_with("/photos") {
                json!({"error": {"code": 100, "message": "photo rejected"}})
            } else {
                json!({"id": "ok_1"})
            }
        });
        let graph = graph_client(log.clone(), respond).await;
        let db = unreachable_pool();

        let accounts = vec![account("page_1", "Page One", "page-token", Some("ig_1"))];
        let placements: PlacementMap = [(
            "page_1".to_string(),
            selection(Some(Placement::Feed), Some(Placement::Feed)),
        )]
        .into();

        let results = dispatch_publication(
            &graph,
            &db,
            &publication("hello", &["https://media.test/0.png"]),
            &accounts,
            &placements,
        )
        .await;

        let facebook = results[0].facebook.as_ref().unwrap();
        assert!(!facebook.success);
        assert!(facebook.error.as_ref().unwrap().contains("photo rejected"));
        assert!(results[0].instagram.as_ref().unwrap().success);
    }

    #[tokio::test]
    async fn accounts_without_a_selection_are_untouched() {
        let log = CallLog::default();
        let graph = graph_client(log.clone(), Arc::new(|_| json!({"id": "x"}))).await;
        let db = unreachable_pool();

        let accounts = vec![
            account("page_1", "Quiet", "token-a", None),
            account("page_2", "Active", "token-b", None),
        ];
        let placements: PlacementMap =
            [("page_2".to_string(), selection(Some(Placement::Feed), None))].into();

        let results =
            dispatch_publication(&graph, &db, &publication("hi", &[]), &accounts, &placements)
                .await;

        assert_eq!(results[0].account_name, "Quiet");
        assert!(results[0].facebook.is_none());
        assert!(results[0].instagram.is_none());
        assert!(results[1].facebook.as_ref().unwrap().success);
        assert_eq!(log.calls().len(), 1);
    }

    #[tokio::test]
    async fn instagram_selection_without_linked_account_is_skipped() {
        let log = CallLog::default();
        let graph = graph_client(log.clone(), Arc::new(|_| json!({"id": "x"}))).await;
        let db = unreachable_pool();

        let accounts = vec![account("page_1", "Page One", "page-token", None)];
        let placements: PlacementMap =
            [("page_1".to_string(), selection(None, Some(Placement::Feed)))].into();

        let results = dispatch_publication(
            &graph,
            &db,
            &publication("hello", &["https://media.test/0.png"]),
            &accounts,
            &placements,
        )
        .await;

        assert!(results[0].facebook.is_none());
        assert!(results[0].instagram.is_none());
        assert!(log.calls().is_empty());
    }

    #[test]
    fn schedule_record_carries_the_whole_submission() {
        let when = Utc::now() + Duration::hours(5);
        let publication = Publication {
            caption: "later".to_string(),
            media_urls: vec!["https://media.test/0.png".to_string()],
            user_access_token: Some("user-token".to_string()),
            scheduled_publish_time: Some(when),
        };

        let record = schedule_record("ig_1", "container_1", "user-token", &publication, when);

        assert_eq!(record.ig_user_id, "ig_1");
        assert_eq!(record.container_id, "container_1");
        assert_eq!(record.caption, "later");
        assert_eq!(record.media_urls, vec!["https://media.test/0.png"]);
        assert_eq!(record.publish_at, when);
        assert_eq!(record.access_token, "user-token");
    }
}
