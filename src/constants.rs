//! Application constants

/// Graph API version used for all Meta calls
pub const GRAPH_API_VERSION: &str = "v23.0";

/// Maximum number of images accepted per submission
pub const MAX_IMAGES_PER_POST: usize = 10;

/// Maximum upload size for a publish submission (50 MB)
pub const MAX_PUBLISH_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

/// Minimum lead time for a scheduled post (Graph API rejects anything closer)
pub const MIN_SCHEDULE_LEAD_MINUTES: i64 = 20;

/// Maximum scheduling horizon (Graph API rejects anything further out)
pub const MAX_SCHEDULE_HORIZON_DAYS: i64 = 29;

/// Page size used when walking paginated Graph API collections
pub const GRAPH_PAGE_LIMIT: u32 = 100;

/// Fields requested when listing connected pages
pub const ACCOUNT_FIELDS: &str =
    "name,id,access_token,picture{url},instagram_business_account{name,username}";

/// Fields requested when listing published/scheduled Facebook posts
pub const FACEBOOK_POST_FIELDS: &str = "message,full_picture,permalink_url,created_time,\
     is_published,scheduled_publish_time,attachments{media,subattachments}";

/// Fields requested when listing Instagram media
pub const INSTAGRAM_MEDIA_FIELDS: &str = "caption,media_url,thumbnail_url,permalink,\
     timestamp,media_type,children{media_url,thumbnail_url,media_type}";
