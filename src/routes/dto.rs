//! Typed request/response schema for the publish API
//!
//! The composer UI serializes accounts and placements as JSON strings inside
//! the multipart form; everything is parsed into these types at the boundary
//! so the dispatcher never touches raw JSON fields.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::constants::{MAX_IMAGES_PER_POST, MAX_SCHEDULE_HORIZON_DAYS, MIN_SCHEDULE_LEAD_MINUTES};
use crate::error::ApiError;

/// A connected Facebook Page, including the page access token used for
/// Facebook calls. Supplied by the accounts listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram_business_account: Option<InstagramAccount>,
}

impl Account {
    /// Display name, falling back to the page id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Linked Instagram business account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Target surface for a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Feed,
    Story,
}

/// Per-account platform selection. Platforms absent from the selection are
/// not published to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PlacementSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<Placement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<Placement>,
}

/// account id -> platform selection
pub type PlacementMap = HashMap<String, PlacementSelection>;

/// One image file from the multipart submission
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Bytes,
    pub content_type: String,
    pub file_name: Option<String>,
}

/// Fully parsed publish submission
#[derive(Debug)]
pub struct PublishRequest {
    pub text: String,
    pub placements: PlacementMap,
    pub accounts: Vec<Account>,
    /// Operator token; Instagram calls use this rather than the page token
    pub user_access_token: Option<String>,
    pub scheduled_publish_time: Option<DateTime<Utc>>,
    pub images: Vec<ImageUpload>,
}

impl PublishRequest {
    /// Baseline validation, run before any network call
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ApiError> {
        if self.text.trim().is_empty() && self.images.is_empty() {
            return Err(ApiError::BadRequest(
                "a caption or at least one image is required".to_string(),
            ));
        }

        if self.images.len() > MAX_IMAGES_PER_POST {
            return Err(ApiError::BadRequest(format!(
                "at most {} images are allowed per post",
                MAX_IMAGES_PER_POST
            )));
        }

        for image in &self.images {
            if !image.content_type.starts_with("image/") {
                return Err(ApiError::BadRequest(format!(
                    "unsupported file type: {}",
                    image.content_type
                )));
            }
        }

        if let Some(when) = self.scheduled_publish_time {
            let lead = when - now;
            if lead < Duration::minutes(MIN_SCHEDULE_LEAD_MINUTES) {
                return Err(ApiError::BadRequest(format!(
                    "scheduled time must be at least {} minutes from now",
                    MIN_SCHEDULE_LEAD_MINUTES
                )));
            }
            if lead > Duration::days(MAX_SCHEDULE_HORIZON_DAYS) {
                return Err(ApiError::BadRequest(format!(
                    "scheduled time must be within {} days",
                    MAX_SCHEDULE_HORIZON_DAYS
                )));
            }
        }

        if self.targets_instagram() && self.user_access_token.is_none() {
            return Err(ApiError::BadRequest(
                "userAccessToken is required for Instagram placements".to_string(),
            ));
        }

        Ok(())
    }

    /// True when at least one selected account with a linked Instagram
    /// business account has an Instagram placement.
    fn targets_instagram(&self) -> bool {
        self.accounts.iter().any(|account| {
            account.instagram_business_account.is_some()
                && self
                    .placements
                    .get(&account.id)
                    .is_some_and(|sel| sel.instagram.is_some())
        })
    }
}

/// Outcome of one platform attempt for one account
#[derive(Debug, Clone, Serialize)]
pub struct PlatformResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlatformResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Per-account dispatch outcome; platforms that were not targeted are absent
#[derive(Debug, Clone, Serialize)]
pub struct AccountResult {
    #[serde(rename = "accountName")]
    pub account_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook: Option<PlatformResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram: Option<PlatformResult>,
}

/// Publish response envelope. The composer UI keys on the literal
/// `status: "sucesso"`.
#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub status: &'static str,
    pub results: Vec<AccountResult>,
}

impl PublishResponse {
    pub fn new(results: Vec<AccountResult>) -> Self {
        Self {
            status: "sucesso",
            results,
        }
    }
}

/// Body of POST /api/posts/query
#[derive(Debug, Deserialize)]
pub struct PostsQuery {
    pub accounts: Vec<Account>,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

/// Which platform a calendar entry came from
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub id: String,
    pub name: String,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            name: account.display_name().to_string(),
        }
    }
}

/// One calendar entry: the raw Graph object flattened in, tagged with origin
#[derive(Debug, Serialize)]
pub struct PostEntry {
    pub platform: Platform,
    pub is_scheduled: bool,
    pub account: AccountSummary,
    #[serde(flatten)]
    pub data: serde_json::Map<String, Value>,
}

/// Per-account fetch failure reported alongside whatever did load
#[derive(Debug, Serialize)]
pub struct FetchError {
    pub account_id: String,
    pub account_name: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PostsResponse {
    pub posts: Vec<PostEntry>,
    pub errors: Vec<FetchError>,
}
