use std::sync::Arc;

use kpop_companion::{
    build_router, config::AppConfig, feed::AuthorCache, storage::Storage, store::MemoryStore,
    video::YouTubeClient, AppState,
};

// ─── Main ──────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kpop_companion=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    let config = AppConfig::from_env();
    tracing::info!("Starting companion backend on {}:{}", config.host, config.port);

    let store = Arc::new(MemoryStore::new());
    let storage = Storage::from_config(&config).expect("Failed to initialize storage directory");
    let metadata =
        Arc::new(YouTubeClient::from_config(&config).expect("Failed to build video metadata client"));
    if config.youtube_api_key.is_empty() {
        tracing::warn!("YOUTUBE_API_KEY not set, falling back to oEmbed for titles");
    }

    let state = AppState::new(config.clone(), store, storage, metadata);

    // Spawn background workers
    spawn_background_workers(state.authors.clone());

    // Build router
    let app = build_router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Companion backend listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Companion backend shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}

// ─── Background Workers ────────────────────────────────

fn spawn_background_workers(authors: Arc<AuthorCache>) {
    // Worker: Drop expired author profiles every 60 seconds
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            authors.purge_expired();
            tracing::debug!("Author cache purged");
        }
    });
}
