// Library re-exports for integration tests.
// The binary crate (main.rs) builds its state from these modules.
// Integration tests in tests/ import them from this lib crate.

pub mod api;
pub mod auth;
pub mod config;
pub mod emoji;
pub mod errors;
pub mod feed;
pub mod invitations;
pub mod livestreams;
pub mod messages;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod presence;
pub mod selector;
pub mod session;
pub mod storage;
pub mod store;
pub mod text;
pub mod users;
pub mod video;
pub mod workspace;
pub mod ws;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::{DefaultOnResponse, TraceLayer},
};

use config::AppConfig;
use feed::AuthorCache;
use presence::PresenceEstimator;
use storage::Storage;
use store::DocumentStore;
use video::VideoMetadata;

// ─── Application State ─────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn DocumentStore>,
    pub storage: Storage,
    pub metadata: Arc<dyn VideoMetadata>,
    /// Author profiles joined into message feeds
    pub authors: Arc<AuthorCache>,
    pub presence: Arc<PresenceEstimator>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        storage: Storage,
        metadata: Arc<dyn VideoMetadata>,
    ) -> Self {
        let authors = Arc::new(AuthorCache::new(store.clone(), config.author_cache_ttl()));
        let presence = Arc::new(PresenceEstimator::from_config(store.clone(), &config));
        Self {
            config,
            store,
            storage,
            metadata,
            authors,
            presence,
        }
    }
}

// ─── Router ────────────────────────────────────────────

pub fn build_router(state: AppState) -> Router {
    // ─── CORS ──────────────────────────────────────────
    let allow_origin = if state.config.cors_origins == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        AllowOrigin::list(origins)
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let upload_limit = state.config.max_upload_size_bytes as usize;

    let user_routes = Router::new()
        .route("/", get(api::users::list_users))
        .route("/@me/display-name", put(api::users::update_display_name))
        .route(
            "/@me/photo",
            put(api::users::set_photo)
                .post(api::users::upload_photo)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/:uid", get(api::users::get_user));

    let livestream_routes = Router::new()
        .route(
            "/",
            get(api::livestreams::list_streams).post(api::livestreams::load_stream),
        )
        .route("/:video_id/title", get(api::livestreams::stream_title));

    let room_routes = Router::new()
        .route(
            "/:kind/:room_id/messages",
            get(api::messages::list_messages).post(api::messages::send_message),
        )
        .route(
            "/:kind/:room_id/messages/:message_id",
            delete(api::messages::delete_message),
        )
        .route(
            "/:kind/:room_id/messages/:message_id/reactions",
            post(api::messages::add_reaction),
        )
        .route("/:kind/:room_id/presence", get(api::presence::active_users));

    let private_chat_routes = Router::new()
        .route(
            "/",
            get(api::private_chats::list_chats).post(api::private_chats::create_chat),
        )
        .route("/:chat_id", get(api::private_chats::get_chat))
        .route("/:chat_id/members", get(api::private_chats::list_members))
        .route("/:chat_id/invite", post(api::private_chats::invite_user));

    let invitation_routes = Router::new()
        .route("/", get(api::invitations::list_invitations))
        .route("/:invitation_id/accept", post(api::invitations::accept))
        .route("/:invitation_id/reject", post(api::invitations::reject));

    let admin_routes = Router::new().route(
        "/livestreams/:video_id/archive",
        post(api::admin::archive_stream),
    );

    // Assemble the full API
    let api = Router::new()
        .route("/auth/session", post(api::auth_routes::create_session))
        .nest("/users", user_routes)
        .nest("/livestreams", livestream_routes)
        .nest("/rooms", room_routes)
        .nest("/private-chats", private_chat_routes)
        .nest("/invitations", invitation_routes)
        .nest("/admin", admin_routes);

    Router::new()
        .route("/api/v1/ws", get(ws::ws_handler))
        .nest("/api/v1", api)
        .route("/files/*key", get(api::files::download))
        .route("/health", get(health_check))
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::extract::Request| {
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        uri = %req.uri(),
                    )
                })
                .on_response(DefaultOnResponse::new().level(tracing::Level::DEBUG)),
        )
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}
