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
use crate::server::dto::{CreateTweetRequest, UpdateTweetRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::server::validation::validate_content;
use crate::types::Tweet;

pub fn tweets_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_tweet))
        .route("/user/{user_id}", get(user_tweets))
        .route("/{tweet_id}", patch(update_tweet).delete(delete_tweet))
}

async fn create_tweet(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTweetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_content(&req.content, "Tweet")?;

    let now = Utc::now();
    let tweet = Tweet {
        id: Uuid::new_v4().to_string(),
        owner_id: user.id.clone(),
        content: req.content.trim().to_string(),
        created_at: now,
        updated_at: now,
    };

    state.store.create_tweet(&tweet)?;

    Ok(ApiResponse::created(tweet, "Tweet created successfully"))
}

async fn user_tweets(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .get_user(&user_id)?
        .or_not_found("User not found")?;

    let tweets = state.store.list_user_tweets(&user_id)?;
    Ok(ApiResponse::ok(tweets, "User tweets fetched successfully"))
}

async fn update_tweet(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(tweet_id): Path<String>,
    Json(req): Json<UpdateTweetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_content(&req.content, "Tweet")?;

    let tweet = state
        .store
        .get_tweet(&tweet_id)?
        .or_not_found("Tweet not found")?;

    if tweet.owner_id != user.id {
        return Err(ApiError::forbidden("Only the author can update this tweet"));
    }

    state.store.update_tweet(&tweet_id, req.content.trim())?;

    let updated = state
        .store
        .get_tweet(&tweet_id)?
        .or_not_found("Tweet not found")?;

    Ok(ApiResponse::ok(updated, "Tweet updated successfully"))
}

async fn delete_tweet(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(tweet_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tweet = state
        .store
        .get_tweet(&tweet_id)?
        .or_not_found("Tweet not found")?;

    if tweet.owner_id != user.id {
        return Err(ApiError::forbidden("Only the author can delete this tweet"));
    }

    state.store.delete_tweet(&tweet_id)?;

    Ok(ApiResponse::ok(json!({}), "Tweet deleted successfully"))
}
