use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type SessionId = String;
pub type MessageId = u64;

/// Sender recorded on messages the room generates itself (joins, departures)
pub const SYSTEM_SENDER: &str = "system";

/// A single authenticated connection. A username may appear in several sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub username: String,
    pub connected_at: DateTime<Utc>,
}

impl Session {
    pub fn user_info(&self) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            username: self.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Chat,
    System,
}

/// A message in the room log. Ids are assigned by the room and define the total order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub sender: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
}

/// Entry of the online user list as sent to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub id: SessionId,
    pub username: String,
}
