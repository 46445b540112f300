use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};

use crate::auth::CurrentUser;
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};

pub fn dashboard_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats/{channel_id}", get(channel_stats))
        .route("/videos/{channel_id}", get(channel_videos))
}

async fn channel_stats(
    CurrentUser(_user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .get_user(&channel_id)?
        .or_not_found("Channel not found")?;

    let stats = state.store.channel_stats(&channel_id)?;
    Ok(ApiResponse::ok(stats, "Channel stats fetched successfully"))
}

async fn channel_videos(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .get_user(&channel_id)?
        .or_not_found("Channel not found")?;

    // Owners see their drafts; everyone else sees published videos only
    let include_unpublished = user.id == channel_id;
    let videos = state
        .store
        .list_videos(Some(&channel_id), include_unpublished, 0, i64::MAX)?;

    Ok(ApiResponse::ok(videos, "Channel videos fetched successfully"))
}
