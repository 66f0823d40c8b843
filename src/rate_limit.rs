//! Fixed-window flood protection for message publishing

use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::RwLock, time::Instant};

use crate::types::SessionId;

/// Messages counted for one session in its current window
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

/// Per-session message budget, reset every `window`
#[derive(Debug, Clone)]
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<SessionId, Window>>>,
    max_per_window: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            max_per_window,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count one message against `session_id`. Returns false once the budget
    /// for the current window is spent.
    pub async fn check(&self, session_id: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.write().await;

        let current = windows.entry(session_id.to_string()).or_insert(Window {
            count: 0,
            started: now,
        });
        if now.duration_since(current.started) >= self.window {
            *current = Window {
                count: 0,
                started: now,
            };
        }
        if current.count >= self.max_per_window {
            return false;
        }
        current.count += 1;
        true
    }

    /// Drop a session's window as soon as it leaves
    pub async fn forget(&self, session_id: &str) {
        self.windows.write().await.remove(session_id);
    }

    /// Drop windows that have been idle for two periods
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let idle = self.window * 2;
        self.windows
            .write()
            .await
            .retain(|_, w| now.duration_since(w.started) < idle);
    }

    pub async fn tracked_keys(&self) -> usize {
        self.windows.read().await.len()
    }
}
