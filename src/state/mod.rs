mod channel;
mod presence;
mod typing;

pub use presence::Admission;

use crate::broadcast::RoomEvent;
use crate::config::ChatConfig;
use crate::rate_limit::RateLimiter;
use crate::types::*;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

/// A session currently shown as typing, with its pending expiry
#[derive(Debug)]
pub struct TypingEntry {
    pub session_id: SessionId,
    pub username: String,
    /// Bumped on every refresh so a timer that already fired cannot clear a newer entry
    pub generation: u64,
    pub timer: JoinHandle<()>,
}

/// Everything mutable about the room. Only touched under `AppState::room`'s write lock.
#[derive(Debug, Default)]
pub struct Room {
    /// Connected sessions in admission order
    pub sessions: Vec<Session>,
    pub log: VecDeque<Message>,
    pub next_message_id: MessageId,
    /// Typing sessions in the order they started typing
    pub typing: Vec<TypingEntry>,
    pub typing_generation: u64,
}

impl Room {
    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    pub fn user_list(&self) -> Vec<UserInfo> {
        self.sessions.iter().map(Session::user_info).collect()
    }

    /// Usernames currently typing, first-come order, without repeats
    pub fn typing_usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.typing.len());
        for entry in &self.typing {
            if !names.contains(&entry.username) {
                names.push(entry.username.clone());
            }
        }
        names
    }

    /// Assign the next id and append to the log, evicting the oldest entries past `limit`
    pub fn append(&mut self, sender: &str, body: String, kind: MessageKind, limit: usize) -> Message {
        let message = Message {
            id: self.next_message_id,
            sender: sender.to_string(),
            body,
            timestamp: Utc::now(),
            kind,
        };
        self.next_message_id += 1;

        self.log.push_back(message.clone());
        while self.log.len() > limit {
            self.log.pop_front();
        }
        message
    }

    /// Drop a session's typing entry and cancel its timer. Returns whether it was typing.
    pub fn clear_typing(&mut self, session_id: &str) -> bool {
        match self.typing.iter().position(|e| e.session_id == session_id) {
            Some(pos) => {
                let entry = self.typing.remove(pos);
                entry.timer.abort();
                true
            }
            None => false,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub room: Arc<RwLock<Room>>,
    /// Fan-out channel; every connected session holds a receiver
    pub broadcast: broadcast::Sender<RoomEvent>,
    pub config: Arc<ChatConfig>,
    pub rate_limiter: Option<RateLimiter>,
}

impl AppState {
    pub fn new(config: ChatConfig) -> Self {
        let (tx, _rx) = broadcast::channel(config.broadcast_capacity);
        let rate_limiter = config
            .rate_limit
            .map(|(max_requests, window)| RateLimiter::new(max_requests, window));

        Self {
            room: Arc::new(RwLock::new(Room::default())),
            broadcast: tx,
            config: Arc::new(config),
            rate_limiter,
        }
    }

    /// Subscribe to every room event from now on, regardless of targeting
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.broadcast.subscribe()
    }

    /// Send an event to subscribers. Callers hold the room write lock so that
    /// the fan-out order matches the order of mutations.
    fn emit(&self, event: RoomEvent) {
        // Ignore send errors (no receivers connected is fine)
        let _ = self.broadcast.send(event);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ChatConfig::default())
    }
}
