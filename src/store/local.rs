//! Local fallback store
//!
//! A JSON snapshot on the device, offering the same capability
//! contract as the remote store. Used whenever the persistence
//! engine is unreachable. If the snapshot location is unusable the
//! store degrades to memory-only operation instead of failing.

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::sync::RwLock;

use super::{PostStore, SaveRequest, StorageInfo, StorageKind};
use crate::api::{EXPORT_VERSION, ExportPayload};
use crate::config::LocalStoreConfig;
use crate::data::{self, EntityId, Post, PostFilter, Stats};
use crate::error::{AppError, Result};

/// Snapshot schema version; older snapshots are reset
const SNAPSHOT_VERSION: &str = "1.0.0";

/// On-disk snapshot shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalData {
    version: String,
    posts: Vec<Post>,
    settings: serde_json::Map<String, serde_json::Value>,
    last_updated: DateTime<Utc>,
}

impl LocalData {
    fn fresh() -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            posts: Vec::new(),
            settings: data::default_settings(),
            last_updated: Utc::now(),
        }
    }
}

pub struct LocalStore {
    /// None when the snapshot location is unusable (memory-only)
    path: Option<PathBuf>,
    quota_bytes: u64,
    data: RwLock<LocalData>,
}

impl LocalStore {
    /// Open the local store, loading an existing snapshot if present
    ///
    /// Never fails: an unusable directory or a corrupt/outdated
    /// snapshot degrades to a fresh in-memory data set, with a
    /// warning. Callers polling for readiness are never blocked.
    pub fn open(config: &LocalStoreConfig) -> Self {
        let path = config.path.clone().or_else(default_snapshot_path);

        let path = path.and_then(|path| {
            if let Some(parent) = path.parent() {
                if let Err(error) = std::fs::create_dir_all(parent) {
                    tracing::warn!(%error, path = %path.display(),
                        "Local store directory unusable; running memory-only");
                    return None;
                }
            }
            Some(path)
        });

        let data = match &path {
            Some(path) if path.exists() => match load_snapshot(path) {
                Some(data) if data.version == SNAPSHOT_VERSION => data,
                Some(_) => {
                    tracing::warn!(path = %path.display(),
                        "Local snapshot has an unknown version; resetting");
                    LocalData::fresh()
                }
                None => LocalData::fresh(),
            },
            _ => LocalData::fresh(),
        };

        Self {
            path,
            quota_bytes: config.quota_bytes,
            data: RwLock::new(data),
        }
    }

    /// Apply a mutation and persist the result atomically
    ///
    /// The mutation runs on a copy; the in-memory state only advances
    /// when the snapshot (and its quota check) went through, so a
    /// failed write never leaves memory and disk disagreeing.
    fn commit<T>(&self, mutate: impl FnOnce(&mut LocalData) -> Result<T>) -> Result<T> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| AppError::LocalStore("snapshot lock poisoned".to_string()))?;

        let mut next = guard.clone();
        let value = mutate(&mut next)?;
        next.last_updated = Utc::now();

        self.persist(&next)?;
        *guard = next;
        Ok(value)
    }

    fn read<T>(&self, read: impl FnOnce(&LocalData) -> T) -> Result<T> {
        let guard = self
            .data
            .read()
            .map_err(|_| AppError::LocalStore("snapshot lock poisoned".to_string()))?;
        Ok(read(&guard))
    }

    /// Write the snapshot via a temp file rename
    fn persist(&self, data: &LocalData) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(data)
            .map_err(|error| AppError::LocalStore(format!("serialize snapshot: {error}")))?;

        if bytes.len() as u64 > self.quota_bytes {
            return Err(AppError::LocalStore(format!(
                "quota exceeded: {} bytes needed, {} allowed",
                bytes.len(),
                self.quota_bytes
            )));
        }

        let Some(path) = &self.path else {
            // Memory-only mode: nothing to write.
            return Ok(());
        };

        let parent = path
            .parent()
            .ok_or_else(|| AppError::LocalStore("snapshot path has no parent".to_string()))?;

        let mut file = tempfile::NamedTempFile::new_in(parent)
            .map_err(|error| AppError::LocalStore(format!("create temp snapshot: {error}")))?;
        file.write_all(&bytes)
            .map_err(|error| AppError::LocalStore(format!("write snapshot: {error}")))?;
        file.persist(path)
            .map_err(|error| AppError::LocalStore(format!("replace snapshot: {error}")))?;

        Ok(())
    }
}

fn default_snapshot_path() -> Option<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "festboard", "festboard")?;
    Some(proj_dirs.data_dir().join("festboard.json"))
}

fn load_snapshot(path: &std::path::Path) -> Option<LocalData> {
    match std::fs::read(path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => Some(data),
            Err(error) => {
                tracing::warn!(%error, path = %path.display(),
                    "Local snapshot is corrupt; resetting");
                None
            }
        },
        Err(error) => {
            tracing::warn!(%error, path = %path.display(), "Failed to read local snapshot");
            None
        }
    }
}

/// Same normalization the API applies: trimmed non-empty content,
/// sanitized markup, empty titles collapsed to None
fn normalize(title: Option<String>, content: String) -> Result<(Option<String>, String)> {
    let content = content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::Validation(
            "Post content must not be empty".to_string(),
        ));
    }

    let title = title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    Ok((title, ammonia::clean(&content)))
}

fn matches_filter(post: &Post, filter: PostFilter) -> bool {
    match filter {
        PostFilter::All => true,
        PostFilter::Today => {
            post.created_at.with_timezone(&Local).date_naive() == Local::now().date_naive()
        }
        PostFilter::WithImages => !post.images.is_empty(),
    }
}

#[async_trait]
impl PostStore for LocalStore {
    async fn get_posts(&self) -> Result<Vec<Post>> {
        self.read(|data| data.posts.clone())
    }

    async fn save_post(&self, request: SaveRequest) -> Result<Post> {
        match request {
            SaveRequest::Create {
                title,
                content,
                images,
            } => {
                let (title, content) = normalize(title, content)?;
                let post = Post {
                    id: EntityId::new().0,
                    title,
                    content,
                    images,
                    created_at: Utc::now(),
                    updated_at: None,
                };

                let inserted = post.clone();
                self.commit(move |data| {
                    data.posts.insert(0, post);
                    Ok(())
                })?;
                Ok(inserted)
            }
            SaveRequest::Update {
                id,
                title,
                content,
                images,
            } => {
                let (title, content) = normalize(title, content)?;
                self.commit(move |data| {
                    let post = data
                        .posts
                        .iter_mut()
                        .find(|post| post.id == id)
                        .ok_or(AppError::NotFound)?;

                    post.title = title;
                    post.content = content;
                    post.images = images;
                    post.updated_at = Some(Utc::now());
                    Ok(post.clone())
                })
            }
        }
    }

    async fn delete_post(&self, id: &str) -> Result<bool> {
        self.commit(|data| {
            let before = data.posts.len();
            data.posts.retain(|post| post.id != id);
            Ok(data.posts.len() < before)
        })
    }

    async fn get_post_by_id(&self, id: &str) -> Result<Option<Post>> {
        self.read(|data| data.posts.iter().find(|post| post.id == id).cloned())
    }

    async fn search_posts(&self, query: &str) -> Result<Vec<Post>> {
        let term = query.trim().to_lowercase();
        self.read(|data| {
            if term.is_empty() {
                return data.posts.clone();
            }

            data.posts
                .iter()
                .filter(|post| {
                    post.title
                        .as_ref()
                        .is_some_and(|title| title.to_lowercase().contains(&term))
                        || post.content.to_lowercase().contains(&term)
                })
                .cloned()
                .collect()
        })
    }

    async fn get_posts_by_filter(&self, filter: PostFilter) -> Result<Vec<Post>> {
        self.read(|data| {
            data.posts
                .iter()
                .filter(|post| matches_filter(post, filter))
                .cloned()
                .collect()
        })
    }

    async fn get_stats(&self) -> Result<Stats> {
        self.read(|data| Stats {
            total_posts: data.posts.len() as i64,
            today_posts: data
                .posts
                .iter()
                .filter(|post| matches_filter(post, PostFilter::Today))
                .count() as i64,
            posts_with_images: data
                .posts
                .iter()
                .filter(|post| !post.images.is_empty())
                .count() as i64,
            last_post_date: data.posts.iter().map(|post| post.created_at).max(),
        })
    }

    async fn get_settings(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        self.read(|data| {
            let mut settings = data::default_settings();
            settings.extend(data.settings.clone());
            settings
        })
    }

    async fn save_setting(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let key = key.to_string();
        let value = value.clone();
        self.commit(move |data| {
            data.settings.insert(key, value);
            Ok(())
        })
    }

    async fn export_data(&self) -> Result<String> {
        let payload = self.read(|data| ExportPayload {
            version: EXPORT_VERSION.to_string(),
            posts: data.posts.clone(),
            settings: data.settings.clone(),
            export_date: Utc::now(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        })?;

        serde_json::to_string_pretty(&payload)
            .map_err(|error| AppError::LocalStore(format!("serialize export: {error}")))
    }

    async fn import_data(&self, payload: &str) -> Result<()> {
        let parsed: serde_json::Value = serde_json::from_str(payload)
            .map_err(|error| AppError::Validation(format!("invalid import payload: {error}")))?;

        let records = parsed
            .get("posts")
            .and_then(|posts| posts.as_array())
            .ok_or_else(|| {
                AppError::Validation("Invalid import format: expected posts array".to_string())
            })?;

        let imported: Vec<Post> = records.iter().filter_map(Post::from_import_record).collect();

        let imported_settings = parsed
            .get("settings")
            .and_then(|settings| settings.as_object())
            .cloned();

        self.commit(move |data| {
            // Imported records first: on id collision the import wins,
            // existing posts the import doesn't mention survive.
            let mut merged: Vec<Post> = Vec::with_capacity(imported.len() + data.posts.len());
            let mut seen = std::collections::HashSet::new();

            for post in imported.into_iter().chain(data.posts.drain(..)) {
                if seen.insert(post.id.clone()) {
                    merged.push(post);
                }
            }

            merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            data.posts = merged;

            if let Some(settings) = imported_settings {
                data.settings.extend(settings);
            }

            Ok(())
        })
    }

    async fn clear_all_data(&self) -> Result<()> {
        self.commit(|data| {
            *data = LocalData::fresh();
            Ok(())
        })
    }

    async fn storage_info(&self) -> Result<StorageInfo> {
        let used = self.read(|data| {
            serde_json::to_vec(data)
                .map(|bytes| bytes.len() as u64)
                .unwrap_or(0)
        })?;

        Ok(StorageInfo {
            available: self.path.is_some(),
            kind: StorageKind::Local,
            used_bytes: used,
            quota_bytes: Some(self.quota_bytes),
            remaining_bytes: Some(self.quota_bytes.saturating_sub(used)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store(temp_dir: &TempDir) -> LocalStore {
        LocalStore::open(&LocalStoreConfig {
            path: Some(temp_dir.path().join("snapshot.json")),
            quota_bytes: 1024 * 1024,
        })
    }

    fn create_request(content: &str, images: Vec<String>) -> SaveRequest {
        SaveRequest::Create {
            title: Some("Title".to_string()),
            content: content.to_string(),
            images,
        }
    }

    #[tokio::test]
    async fn create_and_get_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);

        let images = vec!["img-1".to_string(), "img-2".to_string()];
        let post = store
            .save_post(create_request("<p>hello</p>", images.clone()))
            .await
            .unwrap();

        let fetched = store.get_post_by_id(&post.id).await.unwrap().unwrap();
        assert_eq!(fetched.images, images);
        assert!(fetched.updated_at.is_none());
    }

    #[tokio::test]
    async fn create_rejects_empty_content() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);

        let error = store
            .save_post(create_request("   ", vec![]))
            .await
            .expect_err("empty content must be rejected");
        assert!(matches!(error, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn update_replaces_images_and_stamps_updated_at() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);

        let post = store
            .save_post(create_request("<p>old</p>", vec!["a".to_string()]))
            .await
            .unwrap();

        let updated = store
            .save_post(SaveRequest::Update {
                id: post.id.clone(),
                title: None,
                content: "<p>new</p>".to_string(),
                images: vec!["b".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(updated.images, vec!["b".to_string()]);
        assert!(updated.updated_at.is_some());
        assert_eq!(updated.created_at, post.created_at);

        let missing = store
            .save_post(SaveRequest::Update {
                id: "unknown".to_string(),
                title: None,
                content: "<p>x</p>".to_string(),
                images: vec![],
            })
            .await;
        assert!(matches!(missing, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();

        let post = {
            let store = test_store(&temp_dir);
            store
                .save_post(create_request("<p>persisted</p>", vec![]))
                .await
                .unwrap()
        };

        let reopened = test_store(&temp_dir);
        let posts = reopened.get_posts().await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, post.id);
    }

    #[tokio::test]
    async fn import_merges_and_dedups() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);

        let existing = store
            .save_post(create_request("<p>existing</p>", vec![]))
            .await
            .unwrap();

        let payload = serde_json::json!({
            "posts": [
                {"id": existing.id, "content": "<p>replaced</p>"},
                {"id": "fresh", "content": "<p>fresh</p>", "createdAt": "2024-01-01T00:00:00Z"},
                {"content": "<p>no id</p>"},
            ]
        })
        .to_string();

        store.import_data(&payload).await.unwrap();
        store.import_data(&payload).await.unwrap();

        let posts = store.get_posts().await.unwrap();
        // existing replaced in place, one fresh, one generated id; the
        // second import must not duplicate anything it can identify.
        assert_eq!(
            posts
                .iter()
                .filter(|post| post.content == "<p>replaced</p>")
                .count(),
            1
        );
        assert_eq!(posts.iter().filter(|post| post.id == "fresh").count(), 1);

        // Newest first after merge.
        let mut sorted = posts.clone();
        sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        assert_eq!(posts, sorted);
    }

    #[tokio::test]
    async fn export_import_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);

        store
            .save_post(create_request("<p>one</p>", vec!["img".to_string()]))
            .await
            .unwrap();
        store
            .save_setting("theme", &serde_json::json!("dark"))
            .await
            .unwrap();

        let exported = store.export_data().await.unwrap();

        let other_dir = TempDir::new().unwrap();
        let other = test_store(&other_dir);
        other.import_data(&exported).await.unwrap();

        assert_eq!(
            other.get_posts().await.unwrap().len(),
            store.get_posts().await.unwrap().len()
        );
        assert_eq!(
            other.get_settings().await.unwrap().get("theme"),
            Some(&serde_json::json!("dark"))
        );
    }

    #[tokio::test]
    async fn quota_is_enforced() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::open(&LocalStoreConfig {
            path: Some(temp_dir.path().join("snapshot.json")),
            quota_bytes: 512,
        });

        let error = store
            .save_post(create_request("<p>big</p>", vec!["x".repeat(2048)]))
            .await
            .expect_err("oversized snapshot must be rejected");
        assert!(matches!(error, AppError::LocalStore(_)));

        // The failed write must not leave the oversized post behind.
        assert!(store.get_posts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn storage_info_reports_quota() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);

        let info = store.storage_info().await.unwrap();
        assert!(info.available);
        assert_eq!(info.kind, StorageKind::Local);
        assert_eq!(info.quota_bytes, Some(1024 * 1024));
        assert!(info.remaining_bytes.unwrap() <= 1024 * 1024);
    }

    #[tokio::test]
    async fn stats_reflect_posts() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);

        store
            .save_post(create_request("<p>plain</p>", vec![]))
            .await
            .unwrap();
        store
            .save_post(create_request("<p>pictured</p>", vec!["img".to_string()]))
            .await
            .unwrap();

        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.total_posts, 2);
        assert_eq!(stats.today_posts, 2);
        assert_eq!(stats.posts_with_images, 1);
        assert!(stats.last_post_date.is_some());
    }
}
