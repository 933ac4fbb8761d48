//! Post CRUD endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{Local, Utc};

use super::dto::{PostsQuery, SavePostBody, success, success_message};
use crate::{
    AppState,
    data::{EntityId, Post, PostFilter},
    error::AppError,
};

/// GET /api/posts - List posts, optionally searched and filtered
///
/// Search is applied first, then the filter is layered on top.
pub async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<PostsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let posts = match params.search.as_deref() {
        Some(query) if !query.trim().is_empty() => state.db.search_posts(query).await?,
        _ => state.db.get_all_posts().await?,
    };

    let filter = params
        .filter
        .as_deref()
        .map(PostFilter::parse)
        .unwrap_or_default();
    let posts = apply_filter(posts, filter);

    Ok(Json(success(posts)))
}

/// GET /api/posts/:id - Get a single post
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let post = state.db.get_post(&id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(success(post)))
}

/// POST /api/posts - Create a post
pub async fn create_post(
    State(state): State<AppState>,
    Json(body): Json<SavePostBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let (title, content) = validate_body(body.title, body.content)?;

    let post = Post {
        id: EntityId::new().0,
        title,
        content,
        images: body.images,
        created_at: Utc::now(),
        updated_at: None,
    };

    state.db.create_post(&post).await?;
    tracing::info!(post_id = %post.id, images = post.images.len(), "Post created");

    Ok((StatusCode::CREATED, Json(success(post))))
}

/// PUT /api/posts/:id - Update a post, fully replacing its images
pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SavePostBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (title, content) = validate_body(body.title, body.content)?;

    let updated = state
        .db
        .update_post(&id, title.as_deref(), &content, &body.images)
        .await?;
    tracing::info!(post_id = %id, "Post updated");

    Ok(Json(success(updated)))
}

/// DELETE /api/posts/:id - Delete a post
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.db.delete_post(&id).await? {
        return Err(AppError::NotFound);
    }

    tracing::info!(post_id = %id, "Post deleted");
    Ok(Json(success_message("Post deleted")))
}

/// Validate and normalize an incoming post body
///
/// Content must be non-empty after trimming and is sanitized before
/// it reaches storage. Empty titles collapse to NULL.
fn validate_body(
    title: Option<String>,
    content: Option<String>,
) -> Result<(Option<String>, String), AppError> {
    let content = content.map(|c| c.trim().to_string()).unwrap_or_default();
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

/// Apply a listing filter in memory
fn apply_filter(posts: Vec<Post>, filter: PostFilter) -> Vec<Post> {
    match filter {
        PostFilter::All => posts,
        PostFilter::Today => {
            let today = Local::now().date_naive();
            posts
                .into_iter()
                .filter(|post| post.created_at.with_timezone(&Local).date_naive() == today)
                .collect()
        }
        PostFilter::WithImages => posts
            .into_iter()
            .filter(|post| !post.images.is_empty())
            .collect(),
    }
}
