use super::AppState;
use crate::broadcast::RoomEvent;
use crate::error::{ChatError, ChatResult};
use crate::protocol::ServerMessage;
use crate::types::*;

impl AppState {
    /// Append a chat message from a connected session and fan it out to every
    /// session, sender included
    pub async fn publish(&self, session_id: &str, body: &str) -> ChatResult<Message> {
        let mut room = self.room.write().await;

        let sender = room
            .session(session_id)
            .map(|s| s.username.clone())
            .ok_or(ChatError::NotConnected)?;

        let body = body.trim();
        if body.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let max = self.config.max_message_chars;
        if body.chars().count() > max {
            return Err(ChatError::MessageTooLong { max });
        }

        if let Some(ref limiter) = self.rate_limiter {
            if !limiter.check(session_id).await {
                tracing::warn!(session_id, "Message rate limited");
                return Err(ChatError::RateLimited);
            }
        }

        let message = room.append(
            &sender,
            body.to_string(),
            MessageKind::Chat,
            self.config.history_limit,
        );

        self.emit(RoomEvent::to_all(ServerMessage::MessageReceived {
            message: message.clone(),
        }));

        // Sending ends the sender's typing indicator
        if room.clear_typing(session_id) {
            self.emit(RoomEvent::to_others(
                session_id,
                ServerMessage::TypingUsersChanged {
                    usernames: room.typing_usernames(),
                },
            ));
        }

        tracing::debug!(session_id, message_id = message.id, "Message published");
        Ok(message)
    }

    /// Retained log, oldest first
    pub async fn recent_messages(&self) -> Vec<Message> {
        self.room.read().await.log.iter().cloned().collect()
    }
}
