//! Data models
//!
//! Rust structs representing database entities and derived values.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Create from existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Post
// =============================================================================

/// An announcement entry
///
/// Images are stored as child rows but always travel with their
/// parent post; `images` preserves display order end-to-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: Option<String>,
    /// Rich text, stored as sanitized markup. Never empty after trimming.
    pub content: String,
    /// Image payloads (data URIs or references), in display order
    #[serde(default)]
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Null until the first update
    pub updated_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Parse one record of an imported snapshot
    ///
    /// Returns `None` for records without usable content. Missing ids
    /// get a fresh one; a parseable creation timestamp is preserved so
    /// exports restore with their history intact. Content passes the
    /// same markup sanitizer as a regular save.
    pub fn from_import_record(record: &serde_json::Value) -> Option<Self> {
        let content = record.get("content")?.as_str()?.trim();
        if content.is_empty() {
            return None;
        }

        let id = record
            .get("id")
            .and_then(|id| id.as_str())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| EntityId::new().0);

        let title = record
            .get("title")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .filter(|t| !t.is_empty());

        let images = record
            .get("images")
            .and_then(|images| images.as_array())
            .map(|images| {
                images
                    .iter()
                    .filter_map(|image| image.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let created_at = record
            .get("createdAt")
            .and_then(|raw| raw.as_str())
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Some(Self {
            id,
            title,
            content: ammonia::clean(content),
            images,
            created_at,
            updated_at: None,
        })
    }
}

/// Post row without its images (as stored in the `posts` table)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: String,
    pub title: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PostRow {
    /// Attach the image sequence loaded from the child table
    pub fn into_post(self, images: Vec<String>) -> Post {
        Post {
            id: self.id,
            title: self.title,
            content: self.content,
            images,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Filter applied on top of a post listing or search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostFilter {
    #[default]
    All,
    /// Posts created on the current calendar day
    Today,
    /// Posts with at least one image
    WithImages,
}

impl PostFilter {
    /// Parse the wire representation ("all", "today", "with-images").
    ///
    /// Unknown values fall back to `All`, matching the unfiltered listing.
    pub fn parse(value: &str) -> Self {
        match value {
            "today" => Self::Today,
            "with-images" => Self::WithImages,
            _ => Self::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Today => "today",
            Self::WithImages => "with-images",
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Key-value settings row
///
/// Values are JSON payloads round-tripped exactly.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// Settings the server answers with when nothing is stored yet
pub fn default_settings() -> serde_json::Map<String, serde_json::Value> {
    let mut defaults = serde_json::Map::new();
    defaults.insert("theme".to_string(), serde_json::json!("light"));
    defaults.insert("autoSave".to_string(), serde_json::json!(true));
    defaults.insert("notifications".to_string(), serde_json::json!(true));
    defaults
}

// =============================================================================
// Stats
// =============================================================================

/// Derived statistics, computed fresh on every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_posts: i64,
    /// Posts created on the current calendar day, server-local time
    pub today_posts: i64,
    pub posts_with_images: i64,
    pub last_post_date: Option<DateTime<Utc>>,
}

impl Stats {
    pub fn empty() -> Self {
        Self {
            total_posts: 0,
            today_posts: 0,
            posts_with_images: 0,
            last_post_date: None,
        }
    }
}
