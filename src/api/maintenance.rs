//! Stats, export/import, clear and health endpoints

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;

use super::dto::{EXPORT_VERSION, ExportPayload, success, success_message};
use crate::{AppState, data::Post, error::AppError};

/// GET /api/stats - Derived statistics
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let stats = state.db.get_stats().await?;
    Ok(Json(success(stats)))
}

/// GET /api/health - Health check used by storage-mode probing
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": "API service healthy",
        "timestamp": Utc::now(),
    }))
}

/// GET /api/export - Full JSON snapshot with file-download headers
pub async fn export_data(State(state): State<AppState>) -> Result<Response, AppError> {
    let payload = ExportPayload {
        version: EXPORT_VERSION.to_string(),
        posts: state.db.get_all_posts().await?,
        settings: state.db.get_all_settings().await?,
        export_date: Utc::now(),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let headers = [(
        header::CONTENT_DISPOSITION,
        "attachment; filename=festboard_backup.json",
    )];

    Ok((headers, Json(payload)).into_response())
}

/// POST /api/import - Merge a snapshot into the current data set
///
/// The payload must carry an array of post-like records; anything else
/// is rejected before a single row is written. Known ids are updated,
/// unknown ids created, and records the snapshot doesn't mention are
/// left untouched. Individually broken records are skipped and logged.
pub async fn import_data(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let data = body.get("data").ok_or_else(invalid_format)?;
    let records = data
        .get("posts")
        .and_then(|posts| posts.as_array())
        .ok_or_else(invalid_format)?;

    let mut imported = 0usize;
    for record in records {
        let Some(post) = Post::from_import_record(record) else {
            tracing::warn!(record = %record, "Skipping malformed record in import");
            continue;
        };

        let result = match state.db.get_post(&post.id).await? {
            Some(_) => state
                .db
                .update_post(&post.id, post.title.as_deref(), &post.content, &post.images)
                .await
                .map(|_| ()),
            None => state.db.create_post(&post).await,
        };

        match result {
            Ok(()) => imported += 1,
            Err(error) => {
                tracing::warn!(post_id = %post.id, %error, "Failed to import post");
            }
        }
    }

    if let Some(settings) = data.get("settings").and_then(|s| s.as_object()) {
        for (key, value) in settings {
            if let Err(error) = state.db.set_setting(key, value).await {
                tracing::warn!(%key, %error, "Failed to import setting");
            }
        }
    }

    tracing::info!(imported, total = records.len(), "Import finished");
    Ok(Json(success_message("Data imported")))
}

/// DELETE /api/clear - Irreversibly wipe all data
pub async fn clear_data(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.db.clear_all_data().await?;
    tracing::warn!("All data cleared");

    Ok(Json(success_message("All data cleared")))
}

fn invalid_format() -> AppError {
    AppError::Validation("Invalid import format: expected data.posts array".to_string())
}
