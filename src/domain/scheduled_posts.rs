//! Scheduled post domain - DB queries for deferred Instagram containers
//!
//! A row is written whenever a scheduled submission leaves a media container
//! unpublished; the publisher worker later claims due rows and resolves them
//! with `/media_publish`. All functions use the generic Executor pattern,
//! allowing them to work with both `&PgPool` (for standalone queries) and
//! `&mut PgConnection` (for transactions). Claiming takes the pool directly
//! since `FOR UPDATE SKIP LOCKED` manages its own locking.

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};

/// Row to persist when an Instagram container is deferred
#[derive(Debug, Clone)]
pub struct NewScheduledPost {
    pub ig_user_id: String,
    pub container_id: String,
    pub caption: String,
    pub media_urls: Vec<String>,
    pub publish_at: DateTime<Utc>,
    pub access_token: String,
}

/// Claimed row, carrying just what the worker needs to publish it
#[derive(Debug, sqlx::FromRow)]
pub struct DueScheduledPost {
    pub id: i64,
    pub ig_user_id: String,
    pub container_id: String,
    pub access_token: String,
    pub attempts: i32,
}

/// Create the table and its due-scan index if missing. Run once at startup,
/// alongside the apalis migrations.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scheduled_instagram_posts (
            id BIGSERIAL PRIMARY KEY,
            ig_user_id TEXT NOT NULL,
            container_id TEXT NOT NULL,
            caption TEXT NOT NULL DEFAULT '',
            media_urls TEXT[] NOT NULL DEFAULT '{}',
            publish_at TIMESTAMPTZ NOT NULL,
            access_token TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'SCHEDULED',
            attempts INT NOT NULL DEFAULT 0,
            last_error TEXT,
            published_media_id TEXT,
            processing BOOLEAN NOT NULL DEFAULT FALSE,
            processing_started_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            published_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_scheduled_instagram_posts_due
         ON scheduled_instagram_posts (status, publish_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert a deferred container as SCHEDULED
pub async fn insert<'e, E>(executor: E, post: &NewScheduledPost) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO scheduled_instagram_posts
            (ig_user_id, container_id, caption, media_urls, publish_at, access_token)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(&post.ig_user_id)
    .bind(&post.container_id)
    .bind(&post.caption)
    .bind(&post.media_urls)
    .bind(post.publish_at)
    .bind(&post.access_token)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Claim due rows for publishing. Rows are leased via
/// `processing`/`processing_started_at`; an expired lease makes the row
/// claimable again, so a crashed worker cannot strand it.
pub async fn claim_due_posts(
    pool: &PgPool,
    limit: i64,
    max_attempts: i32,
    lease_seconds: i64,
) -> Result<Vec<DueScheduledPost>, sqlx::Error> {
    sqlx::query_as(
        r#"
        WITH claimed AS (
            SELECT id
            FROM scheduled_instagram_posts
            WHERE status = 'SCHEDULED'
              AND publish_at <= NOW()
              AND attempts < $1
              AND (
                  processing = FALSE
                  OR (
                      processing = TRUE
                      AND processing_started_at IS NOT NULL
                      AND processing_started_at < NOW() - ($2::text || ' seconds')::interval
                  )
              )
            ORDER BY publish_at ASC
            LIMIT $3
            FOR UPDATE SKIP LOCKED
        )
        UPDATE scheduled_instagram_posts p
        SET processing = TRUE,
            processing_started_at = NOW()
        FROM claimed
        WHERE p.id = claimed.id
        RETURNING p.id, p.ig_user_id, p.container_id, p.access_token, p.attempts
        "#,
    )
    .bind(max_attempts)
    .bind(lease_seconds)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Record a successful publish and release the lease
pub async fn mark_published<'e, E>(
    executor: E,
    id: i64,
    media_id: &str,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE scheduled_instagram_posts
        SET status = 'PUBLISHED',
            published_media_id = $2,
            published_at = NOW(),
            last_error = NULL,
            processing = FALSE,
            processing_started_at = NULL
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(media_id)
    .execute(executor)
    .await?;

    Ok(())
}

/// Record a failed attempt, releasing the lease. Rows that reach the attempt
/// cap flip to FAILED and are never claimed again.
pub async fn record_failure<'e, E>(
    executor: E,
    id: i64,
    error: &str,
    max_attempts: i32,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE scheduled_instagram_posts
        SET attempts = attempts + 1,
            last_error = $2,
            status = CASE WHEN attempts + 1 >= $3 THEN 'FAILED' ELSE status END,
            processing = FALSE,
            processing_started_at = NULL
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(error)
    .bind(max_attempts)
    .execute(executor)
    .await?;

    Ok(())
}
