use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::{HeaderMap, HeaderName, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
    routing::{get, patch, post},
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{
    AuthConfig, CurrentUser, MaybeUser, PasswordHasher, TokenPair, cookie_value, issue_pair,
    logout as end_session, rotate_refresh,
};
use crate::error::Error;
use crate::media::MediaKind;
use crate::server::AppState;
use crate::server::dto::{
    AuthPayload, ChangePasswordRequest, LoginRequest, RefreshRequest, UpdateAccountRequest,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::server::upload::collect_multipart;
use crate::server::validation::{validate_email, validate_password, validate_username};
use crate::types::User;

pub fn users_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh-token", post(refresh_token))
        .route("/change-password", post(change_password))
        .route("/current-user", get(current_user))
        .route("/update-account", patch(update_account))
        .route("/avatar", patch(update_avatar))
        .route("/cover-image", patch(update_cover_image))
        .route("/c/{username}", get(channel_profile))
        .route("/history", get(watch_history).delete(clear_watch_history))
        .route("/history/{video_id}", post(add_watch_entry))
}

const COOKIE_ATTRIBUTES: &str = "Path=/; HttpOnly; Secure; SameSite=None";

/// Session cookies carry the same pair returned in the body, so browser
/// and non-browser clients both work.
fn session_cookies(
    auth: &AuthConfig,
    pair: &TokenPair,
) -> AppendHeaders<Vec<(HeaderName, String)>> {
    AppendHeaders(vec![
        (
            SET_COOKIE,
            format!(
                "accessToken={}; {COOKIE_ATTRIBUTES}; Max-Age={}",
                pair.access_token, auth.access_ttl_secs
            ),
        ),
        (
            SET_COOKIE,
            format!(
                "refreshToken={}; {COOKIE_ATTRIBUTES}; Max-Age={}",
                pair.refresh_token, auth.refresh_ttl_secs
            ),
        ),
    ])
}

fn clear_session_cookies() -> AppendHeaders<Vec<(HeaderName, String)>> {
    AppendHeaders(vec![
        (
            SET_COOKIE,
            format!("accessToken=; {COOKIE_ATTRIBUTES}; Max-Age=0"),
        ),
        (
            SET_COOKIE,
            format!("refreshToken=; {COOKIE_ATTRIBUTES}; Max-Age=0"),
        ),
    ])
}

async fn register(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = collect_multipart(multipart).await?;

    let full_name = form.require_text("fullName")?.trim().to_string();
    let email = form.require_text("email")?.trim().to_string();
    let username = form.require_text("username")?.trim().to_lowercase();
    let password = form.require_text("password")?.to_string();

    validate_username(&username)?;
    validate_email(&email)?;
    validate_password(&password)?;

    let avatar_file = form.require_file("avatar")?;

    if state.store.get_user_by_username(&username)?.is_some()
        || state.store.get_user_by_login(&email)?.is_some()
    {
        return Err(ApiError::conflict(
            "User with email or username already exists",
        ));
    }

    // Uploads fail closed: nothing is written to the store unless every
    // upload succeeded
    let avatar = state
        .media
        .store(MediaKind::Image, &avatar_file.filename, &avatar_file.data)
        .await?;

    let cover_image = match form.file("coverImage") {
        Some(file) => Some(
            state
                .media
                .store(MediaKind::Image, &file.filename, &file.data)
                .await?,
        ),
        None => None,
    };

    let hasher = PasswordHasher::new();
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        username,
        email,
        full_name,
        password_hash: hasher.hash(&password)?,
        avatar,
        cover_image,
        refresh_token: None,
        created_at: now,
        updated_at: now,
    };

    match state.store.create_user(&user) {
        Ok(()) => {}
        Err(Error::AlreadyExists) => {
            return Err(ApiError::conflict(
                "User with email or username already exists",
            ));
        }
        Err(e) => return Err(e.into()),
    }

    Ok(ApiResponse::created(user, "User registered successfully"))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identifier = req
        .username
        .as_deref()
        .or(req.email.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Username or email is required"))?;

    let user = state
        .store
        .get_user_by_login(identifier)?
        .or_not_found("User does not exist")?;

    let hasher = PasswordHasher::new();
    if !hasher.verify(&req.password, &user.password_hash)? {
        return Err(ApiError::unauthorized("Invalid user credentials"));
    }

    let pair = issue_pair(state.store.as_ref(), &state.auth, &user)?;
    let cookies = session_cookies(&state.auth, &pair);

    Ok((
        cookies,
        ApiResponse::ok(
            AuthPayload { user, tokens: pair },
            "User logged in successfully",
        ),
    ))
}

async fn logout(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    end_session(state.store.as_ref(), &user.id)?;

    Ok((
        clear_session_cookies(),
        ApiResponse::ok(json!({}), "User logged out"),
    ))
}

async fn refresh_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // The token may arrive in the JSON body or as a cookie; the body is
    // optional entirely
    let from_body = serde_json::from_slice::<RefreshRequest>(&body)
        .ok()
        .and_then(|req| req.refresh_token);

    let presented = from_body
        .or_else(|| cookie_value(&headers, "refreshToken"))
        .ok_or_else(|| ApiError::unauthorized("Refresh token is required"))?;

    let (_user, pair) = rotate_refresh(state.store.as_ref(), &state.auth, &presented).map_err(
        |e| match e {
            Error::Unauthorized | Error::TokenExpired | Error::NotFound => {
                ApiError::unauthorized("Refresh token is expired or used")
            }
            other => other.into(),
        },
    )?;

    let cookies = session_cookies(&state.auth, &pair);
    Ok((cookies, ApiResponse::ok(pair, "Access token refreshed")))
}

async fn change_password(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.new_password != req.confirm_password {
        return Err(ApiError::bad_request("Password confirmation does not match"));
    }
    validate_password(&req.new_password)?;

    let hasher = PasswordHasher::new();
    if !hasher.verify(&req.old_password, &user.password_hash)? {
        return Err(ApiError::unauthorized("Invalid old password"));
    }

    state
        .store
        .update_user_password(&user.id, &hasher.hash(&req.new_password)?)?;

    Ok(ApiResponse::ok(json!({}), "Password changed successfully"))
}

async fn current_user(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    ApiResponse::ok(user, "Current user fetched successfully")
}

async fn update_account(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let full_name = req.full_name.trim();
    let email = req.email.trim();

    if full_name.is_empty() {
        return Err(ApiError::bad_request("Full name is required"));
    }
    validate_email(email)?;

    match state.store.update_user_profile(&user.id, full_name, email) {
        Ok(()) => {}
        Err(Error::AlreadyExists) => return Err(ApiError::conflict("Email already in use")),
        Err(e) => return Err(e.into()),
    }

    let updated = state
        .store
        .get_user(&user.id)?
        .or_not_found("User not found")?;

    Ok(ApiResponse::ok(
        updated,
        "Account details updated successfully",
    ))
}

async fn update_avatar(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = collect_multipart(multipart).await?;
    let file = form.require_file("avatar")?;

    let avatar = state
        .media
        .replace(Some(&user.avatar), MediaKind::Image, &file.filename, &file.data)
        .await?;

    state.store.update_user_avatar(&user.id, &avatar)?;

    let updated = state
        .store
        .get_user(&user.id)?
        .or_not_found("User not found")?;

    Ok(ApiResponse::ok(updated, "Avatar updated successfully"))
}

async fn update_cover_image(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = collect_multipart(multipart).await?;
    let file = form.require_file("coverImage")?;

    let cover_image = state
        .media
        .replace(
            user.cover_image.as_deref(),
            MediaKind::Image,
            &file.filename,
            &file.data,
        )
        .await?;

    state.store.update_user_cover_image(&user.id, &cover_image)?;

    let updated = state
        .store
        .get_user(&user.id)?
        .or_not_found("User not found")?;

    Ok(ApiResponse::ok(updated, "Cover image updated successfully"))
}

async fn channel_profile(
    MaybeUser(viewer): MaybeUser,
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer_id = viewer.as_ref().map(|u| u.id.as_str());

    let profile = state
        .store
        .channel_profile(&username, viewer_id)?
        .or_not_found("Channel does not exist")?;

    Ok(ApiResponse::ok(profile, "User channel fetched successfully"))
}

async fn watch_history(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let history = state.store.watch_history(&user.id)?;
    Ok(ApiResponse::ok(
        history,
        "Watch history fetched successfully",
    ))
}

async fn add_watch_entry(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .get_video(&video_id)?
        .or_not_found("Video not found")?;

    state.store.push_watch_entry(&user.id, &video_id)?;

    let history = state.store.watch_history(&user.id)?;
    Ok(ApiResponse::ok(history, "Added to watch history"))
}

async fn clear_watch_history(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.clear_watch_history(&user.id)?;
    Ok(ApiResponse::ok(json!({}), "Watch history cleared"))
}
