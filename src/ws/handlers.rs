//! WebSocket message dispatch
//!
//! Maps client frames onto room operations for one connection and returns the
//! direct reply, if any. Everything addressed to more than one client travels
//! through the room's broadcast channel instead.

use crate::broadcast::RoomEvent;
use crate::error::ChatError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::Session;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Per-socket login state
#[derive(Debug, Default)]
pub struct Connection {
    pub session: Option<Session>,
    pub events: Option<broadcast::Receiver<RoomEvent>>,
}

impl Connection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }

    /// Forget the current session, returning it if there was one
    pub fn end(&mut self) -> Option<Session> {
        self.events = None;
        self.session.take()
    }
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    conn: &mut Connection,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Login { username } => handle_login(state, conn, username).await,
        ClientMessage::Logout => handle_logout(state, conn).await,
        ClientMessage::SendMessage { body } => handle_send_message(state, conn, body).await,
        ClientMessage::SetTyping { is_typing } => {
            handle_set_typing(state, conn, is_typing).await
        }
    }
}

/// Frames that bring a lagged connection's presence and typing lists back in
/// line with the room. Chat messages skipped by the lag stay lost.
pub async fn resync_after_lag(state: &Arc<AppState>) -> Vec<ServerMessage> {
    let (users, usernames) = state.presence_snapshot().await;
    vec![
        ServerMessage::UserListChanged { users },
        ServerMessage::TypingUsersChanged { usernames },
    ]
}

async fn handle_login(
    state: &Arc<AppState>,
    conn: &mut Connection,
    username: String,
) -> Option<ServerMessage> {
    if let Some(ref session) = conn.session {
        return Some(ServerMessage::from(&ChatError::AlreadyLoggedIn(
            session.username.clone(),
        )));
    }

    match state.admit(&username).await {
        Ok(admission) => {
            conn.session = Some(admission.session.clone());
            conn.events = Some(admission.events);
            Some(ServerMessage::LoggedIn {
                session: admission.session,
                users: admission.users,
                typing: admission.typing,
                history: admission.history,
            })
        }
        Err(e) => {
            tracing::info!("Login rejected: {}", e);
            Some(ServerMessage::from(&e))
        }
    }
}

async fn handle_logout(state: &Arc<AppState>, conn: &mut Connection) -> Option<ServerMessage> {
    let Some(session) = conn.end() else {
        tracing::debug!("Logout without a session ignored");
        return None;
    };

    state.remove(&session.id).await;
    Some(ServerMessage::ConnectionStateChanged { connected: false })
}

async fn handle_send_message(
    state: &Arc<AppState>,
    conn: &Connection,
    body: String,
) -> Option<ServerMessage> {
    let Some(session_id) = conn.session_id() else {
        return Some(ServerMessage::from(&ChatError::NotConnected));
    };

    // The sender gets its own copy through the broadcast like everyone else
    match state.publish(session_id, &body).await {
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(session_id, "Message rejected: {}", e);
            Some(ServerMessage::from(&e))
        }
    }
}

async fn handle_set_typing(
    state: &Arc<AppState>,
    conn: &Connection,
    is_typing: bool,
) -> Option<ServerMessage> {
    let Some(session_id) = conn.session_id() else {
        tracing::debug!("Typing update without a session ignored");
        return None;
    };

    if let Err(e) = state.set_typing(session_id, is_typing).await {
        // Only NotConnected can happen here: the session was removed concurrently
        tracing::debug!(session_id, "Typing update dropped: {}", e);
    }
    None
}
