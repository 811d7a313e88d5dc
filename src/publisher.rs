//! Scheduled Instagram publishing background job using apalis
//!
//! Runs as a cron job that claims due scheduled posts and resolves their
//! containers with `/media_publish`. Rows are leased while in flight, so
//! multiple instances can run side by side.

use apalis::prelude::*;
use apalis_cron::{CronStream, Schedule};
use apalis_sql::postgres::PostgresStorage;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::env;
use std::str::FromStr;

use crate::dispatch::instagram;
use crate::domain::scheduled_posts::{self, DueScheduledPost};
use crate::services::graph::GraphClient;

const MAX_PUBLISH_ATTEMPTS: i32 = 5;
const CLAIM_BATCH_SIZE: i64 = 16;
const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_LEASE_SECONDS: i64 = 300;

/// Job input - marker for batch processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishScheduledJob {
    pub scheduled_at: chrono::DateTime<chrono::Utc>,
}

impl From<chrono::DateTime<chrono::Utc>> for PublishScheduledJob {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        PublishScheduledJob { scheduled_at: dt }
    }
}

/// Shared context for the publisher
#[derive(Clone)]
pub struct PublisherContext {
    pub pool: PgPool,
    pub graph: GraphClient,
}

/// Job handler - publishes a batch of due posts
/// Always returns Ok - individual row failures are logged but don't fail the job
async fn process_publish_job(
    _job: PublishScheduledJob,
    ctx: Data<PublisherContext>,
) -> Result<(), Error> {
    let (published, failed) = publish_due_batch(&ctx).await;
    if published > 0 || failed > 0 {
        tracing::info!(
            "[publisher] Batch complete: {} published, {} failed",
            published,
            failed
        );
    }
    Ok(())
}

/// Start the publisher worker
pub async fn run_publisher_worker(pool: PgPool, graph: GraphClient, cron_seconds: u64) {
    let ctx = PublisherContext {
        pool: pool.clone(),
        graph,
    };

    let concurrency = publisher_concurrency();
    let lease_seconds = publisher_lease_seconds();
    let schedule_expr = format!("*/{} * * * * *", cron_seconds);

    // Run apalis migrations
    PostgresStorage::setup(&pool)
        .await
        .expect("Failed to set up apalis storage");

    let storage: PostgresStorage<PublishScheduledJob> = PostgresStorage::new(pool.clone());
    let schedule = Schedule::from_str(&schedule_expr).expect("Invalid publisher schedule");
    let cron = CronStream::new(schedule);
    let backend = cron.pipe_to_storage(storage);

    tracing::info!(
        "[publisher] Apalis worker starting (every {}s, {} concurrency, {}s lease)",
        cron_seconds,
        concurrency,
        lease_seconds
    );

    let worker = WorkerBuilder::new("scheduled-publish-worker")
        .data(ctx)
        .backend(backend)
        .build_fn(process_publish_job);

    Monitor::new()
        .register(worker)
        .run()
        .await
        .expect("Publisher worker monitor failed");
}

/// Publish every due post, topping the task set up to the concurrency limit
/// as claims come in. Returns (published_count, failed_count).
async fn publish_due_batch(ctx: &PublisherContext) -> (usize, usize) {
    let mut published = 0;
    let mut failed = 0;
    let concurrency = publisher_concurrency();
    let lease_seconds = publisher_lease_seconds();

    let mut tasks = tokio::task::JoinSet::new();
    let mut claim_failed = false;

    loop {
        let needed = concurrency.saturating_sub(tasks.len());
        if needed > 0 && !claim_failed {
            let claim_limit = std::cmp::min(CLAIM_BATCH_SIZE, needed as i64);
            let posts = match scheduled_posts::claim_due_posts(
                &ctx.pool,
                claim_limit,
                MAX_PUBLISH_ATTEMPTS,
                lease_seconds,
            )
            .await
            {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!("[publisher] Claim error: {}", e);
                    claim_failed = true;
                    Vec::new()
                }
            };

            for post in posts {
                let pool = ctx.pool.clone();
                let graph = ctx.graph.clone();
                tasks.spawn(async move { publish_one(&pool, &graph, &post).await });
            }
        }

        if tasks.is_empty() {
            break;
        }

        if let Some(result) = tasks.join_next().await {
            match result {
                Ok(true) => published += 1,
                Ok(false) => failed += 1,
                Err(e) => {
                    tracing::error!("[publisher] Task panicked: {}", e);
                    failed += 1;
                }
            }
        }
    }

    (published, failed)
}

/// Resolve one claimed row. Returns whether the row ended up published.
async fn publish_one(pool: &PgPool, graph: &GraphClient, post: &DueScheduledPost) -> bool {
    let attempt = instagram::publish_container(
        graph,
        &post.ig_user_id,
        &post.access_token,
        &post.container_id,
    )
    .await;

    match attempt {
        Ok(media_id) => {
            tracing::info!(
                "[publisher] Published scheduled post {} as media {}",
                post.id,
                media_id
            );
            if let Err(db_err) = scheduled_posts::mark_published(pool, post.id, &media_id).await {
                // The lease expires and the row is retried; the duplicate
                // publish then errors into last_error and the attempt cap.
                tracing::error!(
                    "[publisher] CRITICAL: published post {} but failed to record it: {}",
                    post.id,
                    db_err
                );
                return false;
            }
            true
        }
        Err(e) => {
            tracing::error!(
                "[publisher] Failed to publish scheduled post {} (attempt {}): {}",
                post.id,
                post.attempts + 1,
                e
            );
            if let Err(db_err) =
                scheduled_posts::record_failure(pool, post.id, &e.to_string(), MAX_PUBLISH_ATTEMPTS)
                    .await
            {
                tracing::error!(
                    "[publisher] CRITICAL: Failed to record failure for post {}: {}",
                    post.id,
                    db_err
                );
            }
            false
        }
    }
}

fn publisher_concurrency() -> usize {
    env::var("PUBLISHER_CONCURRENCY")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_CONCURRENCY)
}

fn publisher_lease_seconds() -> i64 {
    env::var("PUBLISHER_LEASE_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_LEASE_SECONDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CallLog, graph_stub, spawn_server, unreachable_pool};
    use serde_json::json;
    use std::sync::Arc;

    fn due_post() -> DueScheduledPost {
        DueScheduledPost {
            id: 1,
            ig_user_id: "ig_1".to_string(),
            container_id: "container_1".to_string(),
            access_token: "stored-token".to_string(),
            attempts: 0,
        }
    }

    #[test]
    fn cron_expression_parses_for_sub_minute_intervals() {
        let expr = format!("*/{} * * * * *", 30);
        assert!(Schedule::from_str(&expr).is_ok());
    }

    #[tokio::test]
    async fn publish_one_resolves_the_container_with_the_stored_token() {
        let log = CallLog::default();
        let stub = graph_stub(log.clone(), Arc::new(|_| json!({"id": "media_1"})));
        let base = spawn_server(stub).await;
        let graph = GraphClient::with_base_url(base);
        let pool = unreachable_pool();

        // Publishing succeeds but the pool is unreachable, so the row cannot
        // be marked; that counts as a failed outcome.
        assert!(!publish_one(&pool, &graph, &due_post()).await);

        assert_eq!(log.paths(), vec!["ig_1/media_publish"]);
        let calls = log.calls();
        assert_eq!(calls[0].form.get("creation_id").unwrap(), "container_1");
        assert_eq!(calls[0].query.get("access_token").unwrap(), "stored-token");
    }

    #[tokio::test]
    async fn upstream_rejection_is_reported_not_panicked() {
        let log = CallLog::default();
        let stub = graph_stub(
            log.clone(),
            Arc::new(|_| json!({"error": {"code": 9007, "message": "Media ID is not available"}})),
        );
        let base = spawn_server(stub).await;
        let graph = GraphClient::with_base_url(base);
        let pool = unreachable_pool();

        assert!(!publish_one(&pool, &graph, &due_post()).await);
        assert_eq!(log.paths(), vec!["ig_1/media_publish"]);
    }
}
