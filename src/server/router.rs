use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::comments::comments_router;
use super::dashboard::dashboard_router;
use super::likes::likes_router;
use super::playlists::playlists_router;
use super::subscriptions::subscriptions_router;
use super::tweets::tweets_router;
use super::users::users_router;
use super::videos::videos_router;
use crate::auth::AuthConfig;
use crate::media::MediaStorage;
use crate::store::Store;

/// Everything a handler needs, built once at startup and shared.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub media: MediaStorage,
    pub auth: AuthConfig,
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/users", users_router())
        .nest("/api/v1/videos", videos_router())
        .nest("/api/v1/subscriptions", subscriptions_router())
        .nest("/api/v1/comments", comments_router())
        .nest("/api/v1/likes", likes_router())
        .nest("/api/v1/playlists", playlists_router())
        .nest("/api/v1/tweet", tweets_router())
        .nest("/api/v1/dashboard", dashboard_router())
        .layer(DefaultBodyLimit::max(110 * 1024 * 1024))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
