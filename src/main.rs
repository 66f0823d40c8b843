use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatroom::{broadcast, config::ChatConfig, server, state::AppState};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatroom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting chatroom...");

    let config = ChatConfig::from_env();
    let addr = config.bind_addr();
    let state = Arc::new(AppState::new(config));

    broadcast::spawn_rate_limit_sweeper(state.clone());

    let app = server::build_router(state);

    tracing::info!("Listening on ws://{}/ws", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
