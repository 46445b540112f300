use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::server::AppState;
use crate::server::dto::{CreatePlaylistRequest, PlaylistWithVideos, UpdatePlaylistRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::types::{Playlist, User};

pub fn playlists_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_playlist))
        .route(
            "/{playlist_id}",
            get(get_playlist)
                .patch(update_playlist)
                .delete(delete_playlist),
        )
        .route("/add/{video_id}/{playlist_id}", patch(add_video))
        .route("/remove/{video_id}/{playlist_id}", patch(remove_video))
        .route("/user/{user_id}", get(user_playlists))
}

fn require_owner(playlist: &Playlist, user: &User) -> Result<(), ApiError> {
    if playlist.owner_id != user.id {
        return Err(ApiError::forbidden(
            "Only the owner can modify this playlist",
        ));
    }
    Ok(())
}

async fn create_playlist(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePlaylistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Playlist name is required"));
    }

    let now = Utc::now();
    let playlist = Playlist {
        id: Uuid::new_v4().to_string(),
        owner_id: user.id.clone(),
        name: name.to_string(),
        description: req.description.filter(|d| !d.trim().is_empty()),
        created_at: now,
        updated_at: now,
    };

    state.store.create_playlist(&playlist)?;

    Ok(ApiResponse::created(
        playlist,
        "Playlist created successfully",
    ))
}

async fn get_playlist(
    State(state): State<Arc<AppState>>,
    Path(playlist_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let playlist = state
        .store
        .get_playlist(&playlist_id)?
        .or_not_found("Playlist not found")?;
    let videos = state.store.list_playlist_videos(&playlist_id)?;

    Ok(ApiResponse::ok(
        PlaylistWithVideos { playlist, videos },
        "Playlist fetched successfully",
    ))
}

async fn update_playlist(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(playlist_id): Path<String>,
    Json(req): Json<UpdatePlaylistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut playlist = state
        .store
        .get_playlist(&playlist_id)?
        .or_not_found("Playlist not found")?;

    require_owner(&playlist, &user)?;

    if let Some(name) = req.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::bad_request("Playlist name cannot be empty"));
        }
        playlist.name = name;
    }
    if let Some(description) = req.description {
        let description = description.trim().to_string();
        playlist.description = (!description.is_empty()).then_some(description);
    }

    state.store.update_playlist(&playlist)?;

    let updated = state
        .store
        .get_playlist(&playlist_id)?
        .or_not_found("Playlist not found")?;

    Ok(ApiResponse::ok(updated, "Playlist updated successfully"))
}

async fn delete_playlist(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(playlist_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let playlist = state
        .store
        .get_playlist(&playlist_id)?
        .or_not_found("Playlist not found")?;

    require_owner(&playlist, &user)?;

    state.store.delete_playlist(&playlist_id)?;

    Ok(ApiResponse::ok(json!({}), "Playlist deleted successfully"))
}

async fn add_video(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path((video_id, playlist_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let playlist = state
        .store
        .get_playlist(&playlist_id)?
        .or_not_found("Playlist not found")?;

    require_owner(&playlist, &user)?;

    state
        .store
        .get_video(&video_id)?
        .or_not_found("Video not found")?;

    state.store.add_playlist_video(&playlist_id, &video_id)?;

    let videos = state.store.list_playlist_videos(&playlist_id)?;
    Ok(ApiResponse::ok(
        PlaylistWithVideos { playlist, videos },
        "Video added to playlist successfully",
    ))
}

async fn remove_video(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path((video_id, playlist_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let playlist = state
        .store
        .get_playlist(&playlist_id)?
        .or_not_found("Playlist not found")?;

    require_owner(&playlist, &user)?;

    state.store.remove_playlist_video(&playlist_id, &video_id)?;

    let videos = state.store.list_playlist_videos(&playlist_id)?;
    Ok(ApiResponse::ok(
        PlaylistWithVideos { playlist, videos },
        "Video removed from playlist successfully",
    ))
}

async fn user_playlists(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .get_user(&user_id)?
        .or_not_found("User not found")?;

    let playlists = state.store.list_user_playlists(&user_id)?;
    Ok(ApiResponse::ok(
        playlists,
        "User playlists fetched successfully",
    ))
}
