//! Request/response DTOs for the HTTP API
//!
//! Every success body is `{"success":true, ...}`; errors render through
//! `AppError` as `{"success":false,"error":…}`.

use serde::{Deserialize, Serialize};

use crate::data::Post;

/// Query parameters for the post listing
#[derive(Debug, Deserialize)]
pub struct PostsQuery {
    /// Substring search over title and content
    pub search: Option<String>,
    /// "all", "today" or "with-images"
    pub filter: Option<String>,
}

/// Body for POST /api/posts and PUT /api/posts/:id
#[derive(Debug, Deserialize)]
pub struct SavePostBody {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Body for PUT /api/settings/:key
#[derive(Debug, Deserialize)]
pub struct SettingBody {
    pub value: serde_json::Value,
}

/// Full JSON snapshot produced by GET /api/export
///
/// Sufficient to reconstruct state via POST /api/import.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub version: String,
    pub posts: Vec<Post>,
    pub settings: serde_json::Map<String, serde_json::Value>,
    pub export_date: chrono::DateTime<chrono::Utc>,
    pub app_version: String,
}

/// Schema version stamped into exports
pub const EXPORT_VERSION: &str = "1.0.0";

/// Wrap a payload in the success envelope
pub fn success<T: Serialize>(data: T) -> serde_json::Value {
    serde_json::json!({ "success": true, "data": data })
}

/// Success envelope with a human-readable message instead of data
pub fn success_message(message: &str) -> serde_json::Value {
    serde_json::json!({ "success": true, "message": message })
}
