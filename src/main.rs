//! Social publishing API
//!
//! One HTTP service for composing, scheduling and listing Facebook Page and
//! Instagram business posts, plus a background worker that resolves deferred
//! Instagram containers when their publish time arrives.

mod config;
mod constants;
mod dispatch;
mod domain;
mod error;
mod publisher;
mod routes;
mod services;
#[cfg(test)]
mod test_support;

use axum::extract::DefaultBodyLimit;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::constants::MAX_PUBLISH_UPLOAD_SIZE;
use crate::services::cloudinary::CloudinaryClient;
use crate::services::graph::GraphClient;

#[derive(Clone)]
struct AppState {
    db: PgPool,
    graph: GraphClient,
    cloudinary: CloudinaryClient,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().expect("Invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    domain::scheduled_posts::ensure_schema(&pool)
        .await
        .expect("Failed to create scheduled posts schema");

    let state = AppState {
        db: pool.clone(),
        graph: GraphClient::new(&config.graph_api_version),
        cloudinary: CloudinaryClient::new(&config.cloudinary),
    };

    // Background publisher for deferred Instagram containers
    tokio::spawn(publisher::run_publisher_worker(
        pool,
        state.graph.clone(),
        config.publisher_cron_seconds,
    ));

    let app = routes::build_routes()
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(MAX_PUBLISH_UPLOAD_SIZE))
        .with_state(Arc::new(state));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {}: {}", addr, e));

    tracing::info!("Listening on http://{}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server failed");
}
