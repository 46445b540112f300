use std::sync::Arc;

use axum::{
    Router,
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    routing::{get, patch},
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{CurrentUser, MaybeUser};
use crate::media::MediaKind;
use crate::server::AppState;
use crate::server::dto::{ListVideosParams, page_window};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::server::upload::collect_multipart;
use crate::server::validation::validate_title;
use crate::types::Video;

pub fn videos_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_videos).post(publish_video))
        .route(
            "/{id}",
            get(get_video).patch(update_video).delete(delete_video),
        )
        .route("/toggle/publish/{id}", patch(toggle_publish))
}

async fn list_videos(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListVideosParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (offset, limit) = page_window(params.page, params.limit);

    let videos = state
        .store
        .list_videos(params.user_id.as_deref(), false, offset, limit)?;

    Ok(ApiResponse::ok(videos, "Videos fetched successfully"))
}

async fn publish_video(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = collect_multipart(multipart).await?;

    let title = form.require_text("title")?.trim().to_string();
    validate_title(&title, "Video")?;
    let description = form.text("description").map(str::trim).filter(|s| !s.is_empty()).map(String::from);

    let duration_secs = match form.text("duration") {
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite() && *d >= 0.0)
            .ok_or_else(|| ApiError::bad_request("Duration must be a non-negative number"))?,
        None => 0.0,
    };

    let video_upload = form.require_file("videoFile")?;
    let thumbnail_upload = form.require_file("thumbnail")?;

    // Both uploads must land before the record exists
    let video_file = state
        .media
        .store(MediaKind::Video, &video_upload.filename, &video_upload.data)
        .await?;
    let thumbnail = state
        .media
        .store(
            MediaKind::Image,
            &thumbnail_upload.filename,
            &thumbnail_upload.data,
        )
        .await?;

    let now = Utc::now();
    let video = Video {
        id: Uuid::new_v4().to_string(),
        owner_id: user.id.clone(),
        video_file,
        thumbnail,
        title,
        description,
        duration_secs,
        views: 0,
        is_published: true,
        created_at: now,
        updated_at: now,
    };

    state.store.create_video(&video)?;

    Ok(ApiResponse::created(video, "Video published successfully"))
}

async fn get_video(
    MaybeUser(viewer): MaybeUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let video = state.store.get_video(&id)?.or_not_found("Video not found")?;

    let viewer_id = viewer.as_ref().map(|u| u.id.as_str());

    // Drafts are visible to their owner only
    if !video.is_published && viewer_id != Some(video.owner_id.as_str()) {
        return Err(ApiError::not_found("Video not found"));
    }

    state.store.increment_video_views(&id)?;

    let detail = state
        .store
        .video_detail(&id, viewer_id)?
        .or_not_found("Video not found")?;

    Ok(ApiResponse::ok(detail, "Video fetched successfully"))
}

async fn update_video(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = collect_multipart(multipart).await?;

    let mut video = state.store.get_video(&id)?.or_not_found("Video not found")?;

    if video.owner_id != user.id {
        return Err(ApiError::forbidden("Only the owner can update this video"));
    }

    if let Some(title) = form.text("title") {
        let title = title.trim();
        validate_title(title, "Video")?;
        video.title = title.to_string();
    }
    if let Some(description) = form.text("description") {
        let description = description.trim();
        video.description = (!description.is_empty()).then(|| description.to_string());
    }

    if let Some(thumbnail) = form.file("thumbnail") {
        let replaced = state
            .media
            .replace(
                Some(&video.thumbnail),
                MediaKind::Image,
                &thumbnail.filename,
                &thumbnail.data,
            )
            .await?;
        video.thumbnail = replaced;
    }

    state.store.update_video(&video)?;

    let updated = state.store.get_video(&id)?.or_not_found("Video not found")?;

    Ok(ApiResponse::ok(
        updated,
        "Video details updated successfully",
    ))
}

async fn delete_video(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let video = state.store.get_video(&id)?.or_not_found("Video not found")?;

    if video.owner_id != user.id {
        return Err(ApiError::forbidden("Only the owner can delete this video"));
    }

    if !state.store.delete_video(&id)? {
        // Lost a race with a concurrent delete
        return Err(ApiError::not_found("Video not found"));
    }

    // The record is gone; storage cleanup is best-effort
    for reference in [&video.video_file, &video.thumbnail] {
        if let Err(e) = state.media.delete(reference).await {
            tracing::warn!("Failed to delete media object '{}': {}", reference, e);
        }
    }

    Ok(ApiResponse::ok(json!({}), "Video deleted successfully"))
}

async fn toggle_publish(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mut video = state.store.get_video(&id)?.or_not_found("Video not found")?;

    if video.owner_id != user.id {
        return Err(ApiError::forbidden("Only the owner can publish this video"));
    }

    video.is_published = !video.is_published;
    state.store.update_video(&video)?;

    let updated = state.store.get_video(&id)?.or_not_found("Video not found")?;

    let message = if updated.is_published {
        "Video published"
    } else {
        "Video unpublished"
    };
    Ok(ApiResponse::ok(updated, message))
}
