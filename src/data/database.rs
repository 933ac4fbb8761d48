//! SQLite database operations
//!
//! All durable storage goes through this module. Post writes are
//! transactional: a post and its child image rows either all land
//! or none do.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::path::Path;

use super::models::*;
use crate::error::AppError;

/// Database connection pool wrapper
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        // Create connection string
        let connection_string = format!("sqlite:{}?mode=rwc", path.display());

        // Create connection pool
        let pool = SqlitePool::connect(&connection_string).await?;

        // Run migrations
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Get post by ID, with its image sequence
    pub async fn get_post(&self, id: &str) -> Result<Option<Post>, AppError> {
        let row = sqlx::query_as::<_, PostRow>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let images = sqlx::query_scalar::<_, String>(
            "SELECT image_data FROM post_images WHERE post_id = ? ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(row.into_post(images)))
    }

    /// Get all posts, newest first
    pub async fn get_all_posts(&self) -> Result<Vec<Post>, AppError> {
        let rows = sqlx::query_as::<_, PostRow>("SELECT * FROM posts ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        self.attach_images(rows).await
    }

    /// Search posts by case-insensitive substring over title and content
    ///
    /// An empty (or whitespace-only) query matches everything.
    /// Results are ordered by creation time descending, same as the
    /// unfiltered listing; there is no ranking.
    pub async fn search_posts(&self, query: &str) -> Result<Vec<Post>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return self.get_all_posts().await;
        }

        let pattern = format!("%{}%", query);
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT * FROM posts
            WHERE title LIKE ?1 OR content LIKE ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        self.attach_images(rows).await
    }

    /// Create a new post and its images atomically
    ///
    /// `post.created_at` is taken as-is; `updated_at` stays NULL.
    pub async fn create_post(&self, post: &Post) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result: Result<(), AppError> = async {
            sqlx::query(
                r#"
                INSERT INTO posts (id, title, content, created_at, updated_at)
                VALUES (?, ?, ?, ?, NULL)
                "#,
            )
            .bind(&post.id)
            .bind(&post.title)
            .bind(&post.content)
            .bind(post.created_at)
            .execute(&mut *conn)
            .await?;

            insert_images(&mut conn, &post.id, &post.images).await?;

            Ok(())
        }
        .await;

        finish_tx(&mut conn, result).await
    }

    /// Update a post, replacing its image set atomically
    ///
    /// Images are fully replaced (delete-all-then-reinsert), not
    /// diffed. `id` and `created_at` are immutable; `updated_at` is
    /// stamped inside the transaction. Returns the updated post.
    ///
    /// # Errors
    /// `AppError::NotFound` if no post has this id.
    pub async fn update_post(
        &self,
        id: &str,
        title: Option<&str>,
        content: &str,
        images: &[String],
    ) -> Result<Post, AppError> {
        let updated_at = Utc::now();

        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result: Result<(), AppError> = async {
            let updated = sqlx::query(
                r#"
                UPDATE posts
                SET title = ?, content = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(title)
            .bind(content)
            .bind(updated_at)
            .bind(id)
            .execute(&mut *conn)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(AppError::NotFound);
            }

            sqlx::query("DELETE FROM post_images WHERE post_id = ?")
                .bind(id)
                .execute(&mut *conn)
                .await?;

            insert_images(&mut conn, id, images).await?;

            Ok(())
        }
        .await;

        finish_tx(&mut conn, result).await?;

        self.get_post(id).await?.ok_or(AppError::NotFound)
    }

    /// Delete a post and its images atomically
    ///
    /// Returns `false` when no post had this id (not an error).
    pub async fn delete_post(&self, id: &str) -> Result<bool, AppError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result: Result<bool, AppError> = async {
            sqlx::query("DELETE FROM post_images WHERE post_id = ?")
                .bind(id)
                .execute(&mut *conn)
                .await?;

            let deleted = sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(&mut *conn)
                .await?;

            Ok(deleted.rows_affected() > 0)
        }
        .await;

        finish_tx(&mut conn, result).await
    }

    /// Load image sequences for a batch of post rows
    ///
    /// Chunked IN queries to stay under SQLite's bind limit.
    async fn attach_images(&self, rows: Vec<PostRow>) -> Result<Vec<Post>, AppError> {
        if rows.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<&str> = rows.iter().map(|row| row.id.as_str()).collect();
        let mut images_by_post: HashMap<String, Vec<String>> = HashMap::new();

        for chunk in ids.chunks(100) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let query = format!(
                "SELECT post_id, image_data FROM post_images WHERE post_id IN ({}) ORDER BY post_id, position",
                placeholders
            );

            let mut query_builder = sqlx::query_as::<_, (String, String)>(&query);
            for id in chunk {
                query_builder = query_builder.bind(*id);
            }

            for (post_id, image_data) in query_builder.fetch_all(&self.pool).await? {
                images_by_post.entry(post_id).or_default().push(image_data);
            }
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let images = images_by_post.remove(&row.id).unwrap_or_default();
                row.into_post(images)
            })
            .collect())
    }

    // =========================================================================
    // Stats
    // =========================================================================

    /// Compute derived statistics in one aggregate query
    ///
    /// Never cached; "today" is the server-local calendar day.
    pub async fn get_stats(&self) -> Result<Stats, AppError> {
        let (total_posts, today_posts, posts_with_images, last_post_date) =
            sqlx::query_as::<_, (i64, i64, i64, Option<DateTime<Utc>>)>(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM posts),
                    (SELECT COUNT(*) FROM posts
                     WHERE date(created_at, 'localtime') = date('now', 'localtime')),
                    (SELECT COUNT(DISTINCT post_id) FROM post_images),
                    (SELECT MAX(created_at) FROM posts)
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(Stats {
            total_posts,
            today_posts,
            posts_with_images,
            last_post_date,
        })
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Get a setting value by key
    pub async fn get_setting(&self, key: &str) -> Result<Option<serde_json::Value>, AppError> {
        let raw = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        raw.map(|raw| {
            serde_json::from_str(&raw).map_err(|error| {
                AppError::Internal(anyhow::anyhow!("corrupt setting value for {key}: {error}"))
            })
        })
        .transpose()
    }

    /// Set a setting value (upsert by key)
    pub async fn set_setting(&self, key: &str, value: &serde_json::Value) -> Result<(), AppError> {
        let raw = serde_json::to_string(value)
            .map_err(|error| AppError::Internal(anyhow::anyhow!("{error}")))?;

        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(&raw)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get all stored settings as a JSON object
    pub async fn get_all_settings(
        &self,
    ) -> Result<serde_json::Map<String, serde_json::Value>, AppError> {
        let rows = sqlx::query_as::<_, Setting>("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await?;

        let mut settings = serde_json::Map::new();
        for row in rows {
            let value = serde_json::from_str(&row.value).map_err(|error| {
                AppError::Internal(anyhow::anyhow!(
                    "corrupt setting value for {}: {error}",
                    row.key
                ))
            })?;
            settings.insert(row.key, value);
        }

        Ok(settings)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Delete all images, posts, and settings atomically
    ///
    /// Irreversible. Child rows go first.
    pub async fn clear_all_data(&self) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result: Result<(), AppError> = async {
            sqlx::query("DELETE FROM post_images")
                .execute(&mut *conn)
                .await?;
            sqlx::query("DELETE FROM posts").execute(&mut *conn).await?;
            sqlx::query("DELETE FROM settings")
                .execute(&mut *conn)
                .await?;
            Ok(())
        }
        .await;

        finish_tx(&mut conn, result).await
    }
}

/// Insert image rows for a post, preserving array order via `position`
async fn insert_images(
    conn: &mut sqlx::pool::PoolConnection<Sqlite>,
    post_id: &str,
    images: &[String],
) -> Result<(), AppError> {
    let created_at = Utc::now();

    for (position, image_data) in images.iter().enumerate() {
        sqlx::query(
            "INSERT INTO post_images (post_id, image_data, position, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(post_id)
        .bind(image_data)
        .bind(position as i64)
        .bind(created_at)
        .execute(&mut **conn)
        .await?;
    }

    Ok(())
}

/// Commit on success, roll back on failure
async fn finish_tx<T>(
    conn: &mut sqlx::pool::PoolConnection<Sqlite>,
    result: Result<T, AppError>,
) -> Result<T, AppError> {
    match result {
        Ok(value) => {
            sqlx::query("COMMIT").execute(&mut **conn).await?;
            Ok(value)
        }
        Err(error) => {
            let _ = sqlx::query("ROLLBACK").execute(&mut **conn).await;
            Err(error)
        }
    }
}
