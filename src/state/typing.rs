use super::{AppState, TypingEntry};
use crate::broadcast::RoomEvent;
use crate::error::{ChatError, ChatResult};
use crate::protocol::ServerMessage;
use crate::types::SessionId;
use tokio::task::JoinHandle;

impl AppState {
    /// Update a session's typing state.
    ///
    /// `true` on an idle session announces it right away; `true` while already
    /// typing only pushes the expiry back. Without a refresh the entry is cleared
    /// after `typing_timeout`. Updates go to every session except the typist.
    pub async fn set_typing(&self, session_id: &str, is_typing: bool) -> ChatResult<()> {
        let mut room = self.room.write().await;

        let username = room
            .session(session_id)
            .map(|s| s.username.clone())
            .ok_or(ChatError::NotConnected)?;

        if is_typing {
            room.typing_generation += 1;
            let generation = room.typing_generation;
            let timer = self.spawn_typing_timer(session_id.to_string(), generation);

            if let Some(entry) = room.typing.iter_mut().find(|e| e.session_id == session_id) {
                entry.timer.abort();
                entry.timer = timer;
                entry.generation = generation;
                return Ok(());
            }

            room.typing.push(TypingEntry {
                session_id: session_id.to_string(),
                username,
                generation,
                timer,
            });
        } else if !room.clear_typing(session_id) {
            return Ok(());
        }

        let usernames = room.typing_usernames();
        tracing::debug!(session_id, is_typing, typing = usernames.len(), "Typing changed");
        self.emit(RoomEvent::to_others(
            session_id,
            ServerMessage::TypingUsersChanged { usernames },
        ));
        Ok(())
    }

    fn spawn_typing_timer(&self, session_id: SessionId, generation: u64) -> JoinHandle<()> {
        let state = self.clone();
        let timeout = self.config.typing_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            state.expire_typing(&session_id, generation).await;
        })
    }

    /// Clear a typing entry whose timer ran out, unless it was refreshed meanwhile
    async fn expire_typing(&self, session_id: &str, generation: u64) {
        let mut room = self.room.write().await;

        let Some(pos) = room
            .typing
            .iter()
            .position(|e| e.session_id == session_id && e.generation == generation)
        else {
            return;
        };
        // The handle belongs to this very task, so it is dropped rather than aborted
        room.typing.remove(pos);

        tracing::debug!(session_id, "Typing expired");
        self.emit(RoomEvent::to_others(
            session_id,
            ServerMessage::TypingUsersChanged {
                usernames: room.typing_usernames(),
            },
        ));
    }

    pub async fn typing_usernames(&self) -> Vec<String> {
        self.room.read().await.typing_usernames()
    }
}
