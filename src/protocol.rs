use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    Login {
        username: String,
    },
    /// End the current session; the socket stays open and may log in again
    Logout,
    SendMessage {
        body: String,
    },
    SetTyping {
        is_typing: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// `true` once the socket is open, `false` after the session ends
    ConnectionStateChanged {
        connected: bool,
    },
    /// Reply to a successful login with a fresh presence snapshot
    LoggedIn {
        session: Session,
        users: Vec<UserInfo>,
        typing: Vec<String>,
        /// Retained log at the moment of admission (empty when replay is disabled)
        history: Vec<Message>,
    },
    MessageReceived {
        message: Message,
    },
    UserListChanged {
        users: Vec<UserInfo>,
    },
    TypingUsersChanged {
        usernames: Vec<String>,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl From<&crate::error::ChatError> for ServerMessage {
    fn from(err: &crate::error::ChatError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            msg: err.to_string(),
        }
    }
}
