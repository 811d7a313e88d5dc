//! Cloudinary signed-upload client
//!
//! Images are pushed with a timestamped SHA-256 signature and come back as a
//! public `secure_url`, which is what the Graph API consumes downstream.

use reqwest::Client;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::CloudinaryConfig;

const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";

#[derive(Debug, Error)]
pub enum CloudinaryError {
    #[error("Cloudinary request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Cloudinary API error: {0}")]
    Api(String),

    #[error("Unexpected Cloudinary response: {0}")]
    Response(String),
}

#[derive(Clone)]
pub struct CloudinaryClient {
    http: Client,
    upload_url: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryClient {
    pub fn new(config: &CloudinaryConfig) -> Self {
        let upload_url = format!("{}/{}/image/upload", CLOUDINARY_API_BASE, config.cloud_name);
        Self::with_upload_url(upload_url, &config.api_key, &config.api_secret)
    }

    /// Point the client at a different upload endpoint (test doubles)
    pub fn with_upload_url(upload_url: impl Into<String>, api_key: &str, api_secret: &str) -> Self {
        Self {
            http: Client::new(),
            upload_url: upload_url.into(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        }
    }

    /// Upload one image and return its public `secure_url`
    pub async fn upload_image(
        &self,
        data: &[u8],
        content_type: &str,
        file_name: &str,
    ) -> Result<String, CloudinaryError> {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = sign_upload(timestamp, &self.api_secret);

        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| CloudinaryError::Api(format!("invalid mime type: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("signature", signature)
            .part("file", part);

        let response = self
            .http
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text)
            .map_err(|_| CloudinaryError::Response(format!("status {}: {}", status, text)))?;

        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(CloudinaryError::Api(message.to_string()));
        }

        body.get("secure_url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CloudinaryError::Response(format!("missing secure_url: {}", text)))
    }
}

/// Hex SHA-256 over the signable params (`timestamp` here) concatenated with
/// the API secret, per Cloudinary's signed-upload scheme.
fn sign_upload(timestamp: i64, api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("timestamp={}{}", timestamp, api_secret).as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
