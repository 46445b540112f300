use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::LikeToggle;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::types::{Like, LikeTarget, User};

pub fn likes_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/toggle/v/{video_id}", post(toggle_video_like))
        .route("/toggle/c/{comment_id}", post(toggle_comment_like))
        .route("/toggle/t/{tweet_id}", post(toggle_tweet_like))
        .route("/videos", get(liked_videos))
}

/// Shared toggle: delete an existing like, otherwise create one.
async fn toggle(
    state: &AppState,
    user: &User,
    target: LikeTarget,
) -> Result<ApiResponse<LikeToggle>, ApiError> {
    if let Some(existing) = state.store.get_like(&user.id, &target)? {
        state.store.delete_like(&existing.id)?;
        return Ok(ApiResponse::ok(
            LikeToggle { liked: false },
            "Unliked successfully",
        ));
    }

    let like = Like {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        target,
        created_at: Utc::now(),
    };

    match state.store.create_like(&like) {
        // A concurrent toggle got there first; the like exists either way
        Ok(()) | Err(Error::AlreadyExists) => Ok(ApiResponse::ok(
            LikeToggle { liked: true },
            "Liked successfully",
        )),
        Err(e) => Err(e.into()),
    }
}

async fn toggle_video_like(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .get_video(&video_id)?
        .or_not_found("Video not found")?;

    toggle(&state, &user, LikeTarget::Video(video_id)).await
}

async fn toggle_comment_like(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(comment_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .get_comment(&comment_id)?
        .or_not_found("Comment not found")?;

    toggle(&state, &user, LikeTarget::Comment(comment_id)).await
}

async fn toggle_tweet_like(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(tweet_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .get_tweet(&tweet_id)?
        .or_not_found("Tweet not found")?;

    toggle(&state, &user, LikeTarget::Tweet(tweet_id)).await
}

async fn liked_videos(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let videos = state.store.list_liked_videos(&user.id)?;
    Ok(ApiResponse::ok(videos, "Liked videos fetched successfully"))
}
