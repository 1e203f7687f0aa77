#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower::ServiceExt;

use kpop_companion::{
    auth::issue_identity_token,
    build_router,
    config::AppConfig,
    errors::AppResult,
    models::{FederatedIdentity, VideoSnippet},
    storage::Storage,
    store::MemoryStore,
    video::VideoMetadata,
    AppState,
};

/// Video metadata stub that titles every video after its id.
pub struct StubMetadata;

#[async_trait::async_trait]
impl VideoMetadata for StubMetadata {
    async fn fetch_snippet(&self, video_id: &str) -> AppResult<Option<VideoSnippet>> {
        Ok(Some(VideoSnippet {
            title: format!("Stage {video_id}"),
            ..Default::default()
        }))
    }
}

/// Test helper that wraps a fully-built router over an in-memory store.
///
/// Each test gets a fresh store and storage directory, so no data leaks
/// between tests.
pub struct TestApp {
    pub state: AppState,
    pub store: MemoryStore,
    _storage_dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::test_default())
    }

    pub fn with_config(mut config: AppConfig) -> Self {
        let storage_dir = tempfile::tempdir().expect("Failed to create storage dir");
        config.storage_dir = storage_dir.path().to_string_lossy().into_owned();

        let store = MemoryStore::new();
        let storage = Storage::new(storage_dir.path(), &config.storage_public_url);
        let state = AppState::new(
            config,
            Arc::new(store.clone()),
            storage,
            Arc::new(StubMetadata),
        );

        TestApp {
            state,
            store,
            _storage_dir: storage_dir,
        }
    }

    /// Get a fresh clone of the router for a `oneshot` request.
    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Get a router suitable for `axum::serve` (WS integration tests).
    pub fn router_clone(&self) -> Router {
        build_router(self.state.clone())
    }

    // ── Request helpers ──────────────────────────────────

    /// Send a request through the router and return (status, body as Value).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body_bytes = body
            .map(|v| serde_json::to_vec(&v).unwrap())
            .unwrap_or_default();
        self.send(method, uri, token, "application/json", body_bytes)
            .await
    }

    /// Send raw bytes (uploads).
    pub async fn request_bytes(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        content_type: &str,
        body: Vec<u8>,
    ) -> (StatusCode, Value) {
        self.send(method, uri, token, content_type, body).await
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        content_type: &str,
        body_bytes: Vec<u8>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }

        if !body_bytes.is_empty() {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }

        let req = builder.body(Body::from(body_bytes)).unwrap();

        let response = self.router().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();

        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).to_string(),
            ))
        };

        (status, value)
    }

    /// Typed response helper, deserializes into T.
    pub async fn request_typed<T: DeserializeOwned>(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, T) {
        let (status, value) = self.request(method, uri, token, body).await;
        let typed: T = serde_json::from_value(value).expect("Failed to deserialize response body");
        (status, typed)
    }

    // ── High-level helpers ───────────────────────────────

    /// Mint an identity token for `uid` without creating a profile.
    pub fn token_for(&self, uid: &str, name: &str) -> String {
        let identity = FederatedIdentity {
            uid: uid.into(),
            display_name: name.into(),
            email: Some(format!("{uid}@example.com")),
            photo_url: Some(format!("https://img.example.com/{uid}.png")),
        };
        issue_identity_token(&identity, chrono::Duration::hours(1), &self.state.config).unwrap()
    }

    /// Sign a user in (creating the profile). Returns the identity token.
    pub async fn sign_in(&self, uid: &str, name: &str) -> String {
        let token = self.token_for(uid, name);
        let (status, value) = self
            .request(Method::POST, "/api/v1/auth/session", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK, "Sign-in failed: {}", value);
        token
    }

    /// Create a private chat and return its id.
    pub async fn create_chat(&self, token: &str, name: &str, invited: &[&str]) -> String {
        let body = serde_json::json!({
            "name": name,
            "url": "https://www.youtube.com/watch?v=abc123",
            "invitedUsers": invited,
        });
        let (status, value) = self
            .request(Method::POST, "/api/v1/private-chats", Some(token), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "Create chat failed: {}", value);
        value["id"].as_str().unwrap().to_string()
    }

    /// Post a message and return its id.
    pub async fn send_message(&self, token: &str, room_uri: &str, text: &str) -> String {
        let uri = format!("{room_uri}/messages");
        let (status, value) = self
            .request(
                Method::POST,
                &uri,
                Some(token),
                Some(serde_json::json!({ "text": text })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "Send message failed: {}", value);
        value["id"].as_str().unwrap().to_string()
    }
}
