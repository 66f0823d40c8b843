use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{api, state::AppState, ws};

/// Build the application router: WebSocket, read-only API and optional client bundle
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut app: Router<Arc<AppState>> = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(api::health))
        .route("/api/users", get(api::list_users))
        .route("/api/messages", get(api::list_messages));

    if let Some(ref dir) = state.config.static_dir {
        tracing::info!("Serving client bundle from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
