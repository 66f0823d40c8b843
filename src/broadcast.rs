use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::SessionId;
use std::sync::Arc;
use std::time::Duration;

/// One fan-out event. `skip` names the session the event originated from when
/// it should not be echoed back to it.
#[derive(Debug, Clone)]
pub struct RoomEvent {
    pub skip: Option<SessionId>,
    pub message: ServerMessage,
}

impl RoomEvent {
    pub fn to_all(message: ServerMessage) -> Self {
        Self {
            skip: None,
            message,
        }
    }

    pub fn to_others(origin: &str, message: ServerMessage) -> Self {
        Self {
            skip: Some(origin.to_string()),
            message,
        }
    }

    /// Whether a subscriber with the given session should receive this event
    pub fn is_for(&self, session_id: &str) -> bool {
        self.skip.as_deref() != Some(session_id)
    }
}

/// Spawn a background task that drops expired rate limiter windows
pub fn spawn_rate_limit_sweeper(state: Arc<AppState>) {
    let Some(limiter) = state.rate_limiter.clone() else {
        return;
    };

    tokio::spawn(async move {
        let period = limiter.window().max(Duration::from_secs(1)) * 2;
        loop {
            tokio::time::sleep(period).await;
            limiter.cleanup().await;
            let tracked = limiter.tracked_keys().await;
            tracing::trace!(tracked, "Rate limiter swept");
        }
    });
}
