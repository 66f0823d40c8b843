use super::AppState;
use crate::broadcast::RoomEvent;
use crate::error::{ChatError, ChatResult};
use crate::protocol::ServerMessage;
use crate::types::*;
use chrono::Utc;
use tokio::sync::broadcast;

/// Result of a successful login: the new session plus a snapshot of the room
/// taken atomically with its registration
#[derive(Debug)]
pub struct Admission {
    pub session: Session,
    pub users: Vec<UserInfo>,
    pub typing: Vec<String>,
    pub history: Vec<Message>,
    /// Receives every room event emitted after this admission
    pub events: broadcast::Receiver<RoomEvent>,
}

impl AppState {
    /// Trim and check a requested username
    fn validate_username(&self, username: &str) -> ChatResult<String> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ChatError::InvalidUsername(
                "username must not be blank".to_string(),
            ));
        }
        if username.eq_ignore_ascii_case(SYSTEM_SENDER) {
            return Err(ChatError::InvalidUsername(format!(
                "'{}' is reserved",
                username
            )));
        }

        let max = self.config.max_username_chars;
        if username.chars().count() > max {
            return Err(ChatError::InvalidUsername(format!(
                "username must be at most {} characters",
                max
            )));
        }

        Ok(username.to_string())
    }

    /// Register a new session and announce it to everyone else
    pub async fn admit(&self, username: &str) -> ChatResult<Admission> {
        let username = self.validate_username(username)?;

        let mut room = self.room.write().await;

        let session = Session {
            id: ulid::Ulid::new().to_string(),
            username,
            connected_at: Utc::now(),
        };

        let history = if self.config.replay_history {
            room.log.iter().cloned().collect()
        } else {
            Vec::new()
        };

        room.sessions.push(session.clone());
        let joined = room.append(
            SYSTEM_SENDER,
            format!("{} joined the chat", session.username),
            MessageKind::System,
            self.config.history_limit,
        );
        let users = room.user_list();

        self.emit(RoomEvent::to_others(
            &session.id,
            ServerMessage::MessageReceived { message: joined },
        ));
        self.emit(RoomEvent::to_others(
            &session.id,
            ServerMessage::UserListChanged {
                users: users.clone(),
            },
        ));

        // Still under the write lock: the joiner starts right after its own join
        let events = self.subscribe();

        tracing::info!(
            session_id = %session.id,
            username = %session.username,
            online = room.sessions.len(),
            "Session admitted"
        );

        Ok(Admission {
            session,
            users,
            typing: room.typing_usernames(),
            history,
            events,
        })
    }

    /// Remove a session and announce the departure. Removing an unknown or
    /// already-removed session does nothing and returns None.
    pub async fn remove(&self, session_id: &str) -> Option<Session> {
        let mut room = self.room.write().await;

        let Some(pos) = room.sessions.iter().position(|s| s.id == session_id) else {
            tracing::debug!(session_id, "Remove for unknown session ignored");
            return None;
        };

        let session = room.sessions.remove(pos);
        let was_typing = room.clear_typing(session_id);

        let left = room.append(
            SYSTEM_SENDER,
            format!("{} left the chat", session.username),
            MessageKind::System,
            self.config.history_limit,
        );

        self.emit(RoomEvent::to_all(ServerMessage::MessageReceived {
            message: left,
        }));
        self.emit(RoomEvent::to_all(ServerMessage::UserListChanged {
            users: room.user_list(),
        }));
        if was_typing {
            self.emit(RoomEvent::to_all(ServerMessage::TypingUsersChanged {
                usernames: room.typing_usernames(),
            }));
        }

        tracing::info!(
            session_id,
            username = %session.username,
            online = room.sessions.len(),
            "Session removed"
        );
        drop(room);

        if let Some(ref limiter) = self.rate_limiter {
            limiter.forget(session_id).await;
        }

        Some(session)
    }

    /// Connected sessions in admission order
    pub async fn list_active(&self) -> Vec<Session> {
        self.room.read().await.sessions.clone()
    }

    /// Online users and typing usernames read together, for clients that
    /// missed fan-out events
    pub async fn presence_snapshot(&self) -> (Vec<UserInfo>, Vec<String>) {
        let room = self.room.read().await;
        (room.user_list(), room.typing_usernames())
    }

    pub async fn online_count(&self) -> usize {
        self.room.read().await.sessions.len()
    }
}
