use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, patch},
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::server::AppState;
use crate::server::dto::{CreateCommentRequest, PageParams, UpdateCommentRequest, page_window};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::server::validation::validate_content;
use crate::types::Comment;

pub fn comments_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{video_id}", get(list_comments).post(add_comment))
        .route("/c/{comment_id}", patch(update_comment).delete(delete_comment))
}

async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .get_video(&video_id)?
        .or_not_found("Video not found")?;

    let (offset, limit) = page_window(params.page, params.limit);
    let comments = state.store.list_video_comments(&video_id, offset, limit)?;

    Ok(ApiResponse::ok(comments, "Comments fetched successfully"))
}

async fn add_comment(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_content(&req.content, "Comment")?;

    state
        .store
        .get_video(&video_id)?
        .or_not_found("Video not found")?;

    let now = Utc::now();
    let comment = Comment {
        id: Uuid::new_v4().to_string(),
        video_id,
        owner_id: user.id.clone(),
        content: req.content.trim().to_string(),
        created_at: now,
        updated_at: now,
    };

    state.store.create_comment(&comment)?;

    Ok(ApiResponse::created(comment, "Comment added successfully"))
}

async fn update_comment(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(comment_id): Path<String>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_content(&req.content, "Comment")?;

    let comment = state
        .store
        .get_comment(&comment_id)?
        .or_not_found("Comment not found")?;

    if comment.owner_id != user.id {
        return Err(ApiError::forbidden("Only the author can update this comment"));
    }

    state
        .store
        .update_comment(&comment_id, req.content.trim())?;

    let updated = state
        .store
        .get_comment(&comment_id)?
        .or_not_found("Comment not found")?;

    Ok(ApiResponse::ok(updated, "Comment updated successfully"))
}

async fn delete_comment(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(comment_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state
        .store
        .get_comment(&comment_id)?
        .or_not_found("Comment not found")?;

    if comment.owner_id != user.id {
        return Err(ApiError::forbidden("Only the author can delete this comment"));
    }

    state.store.delete_comment(&comment_id)?;

    Ok(ApiResponse::ok(json!({}), "Comment deleted successfully"))
}
