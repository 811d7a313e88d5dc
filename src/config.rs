//! Environment-driven configuration

use std::env;

use crate::constants::GRAPH_API_VERSION;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_PUBLISHER_CRON_SECONDS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} is not valid: {1}")]
    Invalid(&'static str, String),
}

/// Cloudinary upload credentials
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub graph_api_version: String,
    pub cloudinary: CloudinaryConfig,
    /// How often the scheduled-post publisher wakes up
    pub publisher_cron_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(v) => v
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT", v.clone()))?,
            Err(_) => DEFAULT_PORT,
        };

        let database_url = require("DATABASE_URL")?;

        let graph_api_version =
            env::var("GRAPH_API_VERSION").unwrap_or_else(|_| GRAPH_API_VERSION.to_string());

        let cloudinary = CloudinaryConfig {
            cloud_name: require("CLOUDINARY_CLOUD_NAME")?,
            api_key: require("CLOUDINARY_API_KEY")?,
            api_secret: require("CLOUDINARY_API_SECRET")?,
        };

        let publisher_cron_seconds = env::var("PUBLISHER_CRON_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|v| *v > 0 && *v <= 59)
            .unwrap_or(DEFAULT_PUBLISHER_CRON_SECONDS);

        Ok(AppConfig {
            port,
            database_url,
            graph_api_version,
            cloudinary,
            publisher_cron_seconds,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}
