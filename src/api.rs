//! Read-only HTTP endpoints alongside the WebSocket.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;
use crate::types::{Message, UserInfo};

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub online: usize,
    pub messages: usize,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let room = state.room.read().await;
    Json(HealthResponse {
        status: "ok",
        online: room.sessions.len(),
        messages: room.log.len(),
    })
}

/// Current presence snapshot.
///
/// GET /api/users
pub async fn list_users(State(state): State<Arc<AppState>>) -> Json<Vec<UserInfo>> {
    let users = state
        .list_active()
        .await
        .iter()
        .map(|s| s.user_info())
        .collect();
    Json(users)
}

/// Retained message log, oldest first.
///
/// GET /api/messages
pub async fn list_messages(State(state): State<Arc<AppState>>) -> Json<Vec<Message>> {
    Json(state.recent_messages().await)
}
