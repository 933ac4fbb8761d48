//! API layer
//!
//! HTTP front door of the persistence engine:
//! - Post CRUD, search and filtering
//! - Settings
//! - Stats, export/import, clear, health

mod dto;
mod maintenance;
mod posts;
mod settings;

pub use dto::*;

use axum::{
    Router,
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
};

use crate::AppState;

/// Create the API router, mounted under `/api`
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(posts::list_posts))
        .route("/posts", post(posts::create_post))
        .route("/posts/:id", get(posts::get_post))
        .route("/posts/:id", put(posts::update_post))
        .route("/posts/:id", delete(posts::delete_post))
        .route("/stats", get(maintenance::get_stats))
        .route("/settings", get(settings::get_settings))
        .route("/settings/:key", put(settings::put_setting))
        .route("/export", get(maintenance::export_data))
        .route("/import", post(maintenance::import_data))
        .route("/clear", delete(maintenance::clear_data))
        .route("/health", get(maintenance::health))
        .fallback(api_not_found)
}

/// Unknown API path: JSON 404, never HTML
async fn api_not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "success": false,
            "error": "Unknown API endpoint",
        })),
    )
}
