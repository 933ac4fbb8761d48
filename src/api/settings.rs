//! Settings endpoints

use axum::{
    extract::{Path, State},
    response::Json,
};

use super::dto::{SettingBody, success, success_message};
use crate::{AppState, data, error::AppError};

/// GET /api/settings - All settings, with defaults for unset keys
pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut settings = data::default_settings();
    settings.extend(state.db.get_all_settings().await?);

    Ok(Json(success(settings)))
}

/// PUT /api/settings/:key - Upsert a single setting
pub async fn put_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<SettingBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.db.set_setting(&key, &body.value).await?;
    tracing::debug!(%key, "Setting updated");

    Ok(Json(success_message("Setting updated")))
}
