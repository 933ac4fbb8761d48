//! Store clients
//!
//! The application layer never talks to a backend directly; it talks
//! to "the current storage", a reference owned and swapped by the
//! [`StorageManager`]. Two interchangeable backends implement one
//! capability contract:
//!
//! - [`RemoteStore`]: thin HTTP layer over the persistence engine API
//! - [`LocalStore`]: on-device JSON fallback with the same behavior

mod local;
mod manager;
mod remote;

pub use local::LocalStore;
pub use manager::{StorageManager, StorageMode, StorageModeInfo};
pub use remote::RemoteStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::data::{Post, PostFilter, Stats};
use crate::error::Result;

/// A post save, resolved to create-vs-update by the caller
///
/// There is deliberately no "save and let the store guess" entry
/// point; the dispatch is explicit at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveRequest {
    Create {
        title: Option<String>,
        content: String,
        images: Vec<String>,
    },
    Update {
        id: String,
        title: Option<String>,
        content: String,
        images: Vec<String>,
    },
}

/// Which kind of backend a store reports itself as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Database,
    Local,
}

/// Capacity and usage report for a backend
///
/// Remote/database backends are unbounded and report no quota;
/// bounded local backends report quota and remaining capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    /// Whether the backend is currently usable
    pub available: bool,
    pub kind: StorageKind,
    /// Approximate size of the stored data in bytes
    pub used_bytes: u64,
    pub quota_bytes: Option<u64>,
    pub remaining_bytes: Option<u64>,
}

/// Capability contract shared by every storage backend
///
/// Behavior must be identical across implementations: same
/// validation, same ordering, same merge semantics. The trait is
/// object-safe so the manager can hand out `Arc<dyn PostStore>`.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// All posts, newest first
    async fn get_posts(&self) -> Result<Vec<Post>>;

    /// Create or update a post
    async fn save_post(&self, request: SaveRequest) -> Result<Post>;

    /// Delete a post; `false` when the id was unknown
    async fn delete_post(&self, id: &str) -> Result<bool>;

    /// Get a post by id
    async fn get_post_by_id(&self, id: &str) -> Result<Option<Post>>;

    /// Case-insensitive substring search; empty query returns all
    async fn search_posts(&self, query: &str) -> Result<Vec<Post>>;

    /// Posts matching a listing filter
    async fn get_posts_by_filter(&self, filter: PostFilter) -> Result<Vec<Post>>;

    /// Derived statistics, computed fresh
    async fn get_stats(&self) -> Result<Stats>;

    /// All settings, defaults merged under stored values
    async fn get_settings(&self) -> Result<serde_json::Map<String, serde_json::Value>>;

    /// Upsert one setting
    async fn save_setting(&self, key: &str, value: &serde_json::Value) -> Result<()>;

    /// Serialize every post, every setting, and export metadata into
    /// one payload that `import_data` can fully restore from
    async fn export_data(&self) -> Result<String>;

    /// Merge a serialized snapshot into the current data
    ///
    /// De-duplicates by id (imported record wins), keeps unreferenced
    /// existing data, sorts by creation time descending.
    async fn import_data(&self, payload: &str) -> Result<()>;

    /// Irreversibly wipe all posts and settings
    async fn clear_all_data(&self) -> Result<()>;

    /// Usage/capacity report
    async fn storage_info(&self) -> Result<StorageInfo>;
}
