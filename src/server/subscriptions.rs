use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};

use crate::auth::CurrentUser;
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::SubscriptionToggle;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};

pub fn subscriptions_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/c/{channel_id}", post(toggle_subscription))
        .route("/u/{channel_id}", get(channel_subscribers))
        .route("/channels/{subscriber_id}", get(subscribed_channels))
        .route("/subscribed/c/{channel_id}", get(is_subscribed))
}

async fn toggle_subscription(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .get_user(&channel_id)?
        .or_not_found("Channel not found")?;

    if state.store.delete_subscription(&user.id, &channel_id)? {
        return Ok(ApiResponse::ok(
            SubscriptionToggle { subscribed: false },
            "Unsubscribed successfully",
        ));
    }

    match state.store.create_subscription(&user.id, &channel_id) {
        // A concurrent toggle already created the edge; the end state is
        // the same
        Ok(()) | Err(Error::AlreadyExists) => Ok(ApiResponse::ok(
            SubscriptionToggle { subscribed: true },
            "Subscribed successfully",
        )),
        Err(e) => Err(e.into()),
    }
}

async fn channel_subscribers(
    CurrentUser(_user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .get_user(&channel_id)?
        .or_not_found("Channel not found")?;

    let subscribers = state.store.list_channel_subscribers(&channel_id)?;
    Ok(ApiResponse::ok(
        subscribers,
        "Subscribers list fetched successfully",
    ))
}

async fn subscribed_channels(
    CurrentUser(_user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(subscriber_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .get_user(&subscriber_id)?
        .or_not_found("User not found")?;

    let channels = state.store.list_subscribed_channels(&subscriber_id)?;
    Ok(ApiResponse::ok(
        channels,
        "Subscribed channels fetched successfully",
    ))
}

async fn is_subscribed(
    CurrentUser(user): CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let subscribed = state.store.subscription_exists(&user.id, &channel_id)?;

    let message = if subscribed {
        "User is a subscriber of the channel"
    } else {
        "User is not a subscriber of the channel"
    };
    Ok(ApiResponse::ok(subscribed, message))
}
