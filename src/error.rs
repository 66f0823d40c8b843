/// Result type for room operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Errors that can occur while handling a chat session
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Session is not connected")]
    NotConnected,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Message exceeds {max} characters")]
    MessageTooLong { max: usize },

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Already logged in as {0}")]
    AlreadyLoggedIn(String),

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChatError {
    /// Stable code sent to clients in `error` frames
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::InvalidUsername(_) => "INVALID_USERNAME",
            ChatError::NotConnected => "NOT_CONNECTED",
            ChatError::EmptyMessage => "EMPTY_MESSAGE",
            ChatError::MessageTooLong { .. } => "MESSAGE_TOO_LONG",
            ChatError::RateLimited => "RATE_LIMITED",
            ChatError::AlreadyLoggedIn(_) => "ALREADY_LOGGED_IN",
            ChatError::TransportFailure(_) => "TRANSPORT_FAILURE",
            ChatError::Serialization(_) => "SERIALIZATION",
        }
    }
}
