use std::path::Path;
use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use tempfile::TempDir;

use showreel::auth::AuthConfig;
use showreel::media::MediaStorage;
use showreel::server::{AppState, create_router};
use showreel::store::{SqliteStore, Store};

pub const TEST_PASSWORD: &str = "password123";

pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    pub client: reqwest::Client,
}

pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub username: String,
}

impl TestServer {
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");

        let store = SqliteStore::new(temp_dir.path().join("showreel.db")).expect("open store");
        store.initialize().expect("initialize store");

        let state = Arc::new(AppState {
            store: Arc::new(store),
            media: MediaStorage::new(temp_dir.path()),
            auth: AuthConfig::new("test-access-secret", "test-refresh-secret"),
        });

        let app = create_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        Self {
            temp_dir,
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub async fn register(&self, username: &str) -> reqwest::Response {
        let form = Form::new()
            .text("fullName", format!("{username} Example"))
            .text("email", format!("{username}@example.com"))
            .text("username", username.to_string())
            .text("password", TEST_PASSWORD.to_string())
            .part(
                "avatar",
                Part::bytes(b"fake avatar bytes".to_vec()).file_name("avatar.png"),
            );

        self.client
            .post(self.url("/api/v1/users/register"))
            .multipart(form)
            .send()
            .await
            .expect("register request")
    }

    pub async fn login(&self, username: &str) -> Session {
        let resp: Value = self
            .client
            .post(self.url("/api/v1/users/login"))
            .json(&json!({ "username": username, "password": TEST_PASSWORD }))
            .send()
            .await
            .expect("login request")
            .json()
            .await
            .expect("parse login response");

        Session {
            access_token: resp["data"]["accessToken"]
                .as_str()
                .expect("access token")
                .to_string(),
            refresh_token: resp["data"]["refreshToken"]
                .as_str()
                .expect("refresh token")
                .to_string(),
            user_id: resp["data"]["user"]["id"]
                .as_str()
                .expect("user id")
                .to_string(),
            username: username.to_string(),
        }
    }

    /// Register a fresh user and log them in.
    pub async fn signup(&self, username: &str) -> Session {
        let resp = self.register(username).await;
        assert_eq!(resp.status(), 201, "registration failed for {username}");
        self.login(username).await
    }

    pub async fn publish_video(&self, session: &Session, title: &str) -> Value {
        let form = Form::new()
            .text("title", title.to_string())
            .text("description", format!("About {title}"))
            .text("duration", "12.5")
            .part(
                "videoFile",
                Part::bytes(b"fake video bytes".to_vec()).file_name("clip.mp4"),
            )
            .part(
                "thumbnail",
                Part::bytes(b"fake thumbnail bytes".to_vec()).file_name("thumb.png"),
            );

        let resp = self
            .client
            .post(self.url("/api/v1/videos"))
            .bearer_auth(&session.access_token)
            .multipart(form)
            .send()
            .await
            .expect("publish request");
        assert_eq!(resp.status(), 201, "publish failed for {title}");

        let body: Value = resp.json().await.expect("parse publish response");
        body["data"].clone()
    }

    pub async fn toggle_subscription(&self, session: &Session, channel_id: &str) -> Value {
        let resp: Value = self
            .client
            .post(self.url(&format!("/api/v1/subscriptions/c/{channel_id}")))
            .bearer_auth(&session.access_token)
            .send()
            .await
            .expect("toggle subscription")
            .json()
            .await
            .expect("parse toggle response");
        resp["data"].clone()
    }

    pub async fn channel_profile(&self, username: &str, session: Option<&Session>) -> reqwest::Response {
        let mut req = self
            .client
            .get(self.url(&format!("/api/v1/users/c/{username}")));
        if let Some(session) = session {
            req = req.bearer_auth(&session.access_token);
        }
        req.send().await.expect("channel profile request")
    }
}
