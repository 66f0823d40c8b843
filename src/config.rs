//! Runtime configuration loaded from environment variables

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Chat server configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Maximum number of messages retained in the room log
    pub history_limit: usize,
    /// Whether newly admitted sessions receive the retained log
    pub replay_history: bool,
    /// Inactivity window after which a typing indicator is cleared
    pub typing_timeout: Duration,
    pub max_username_chars: usize,
    pub max_message_chars: usize,
    /// Capacity of the fan-out channel; slower subscribers skip events beyond this
    pub broadcast_capacity: usize,
    /// Messages allowed per session per window (None = disabled)
    pub rate_limit: Option<(u32, Duration)>,
    /// Directory of a built client bundle to serve at `/`
    pub static_dir: Option<PathBuf>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3001,
            history_limit: 200,
            replay_history: true,
            typing_timeout: Duration::from_millis(1000),
            max_username_chars: 32,
            max_message_chars: 2000,
            broadcast_capacity: 256,
            rate_limit: Some((20, Duration::from_secs(10))),
            static_dir: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v != "0" && v.to_lowercase() != "false")
        .unwrap_or(default)
}

impl ChatConfig {
    /// Load config from environment variables, falling back to defaults for
    /// anything unset or unparseable
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let rate_limit = if env_flag("CHAT_RATE_LIMIT", true) {
            let max_requests = env_parse("CHAT_RATE_LIMIT_MAX").unwrap_or(20);
            let window_secs = env_parse("CHAT_RATE_LIMIT_WINDOW").unwrap_or(10);
            Some((max_requests, Duration::from_secs(window_secs)))
        } else {
            None
        };

        let static_dir = std::env::var("CHAT_STATIC_DIR")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let config = Self {
            host: env_parse("CHAT_HOST").unwrap_or(defaults.host),
            port: env_parse("CHAT_PORT").unwrap_or(defaults.port),
            history_limit: env_parse("CHAT_HISTORY_LIMIT").unwrap_or(defaults.history_limit),
            replay_history: env_flag("CHAT_REPLAY_HISTORY", defaults.replay_history),
            typing_timeout: env_parse("CHAT_TYPING_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.typing_timeout),
            max_username_chars: env_parse("CHAT_MAX_USERNAME_CHARS")
                .unwrap_or(defaults.max_username_chars),
            max_message_chars: env_parse("CHAT_MAX_MESSAGE_CHARS")
                .unwrap_or(defaults.max_message_chars),
            broadcast_capacity: env_parse::<usize>("CHAT_BROADCAST_CAPACITY")
                .filter(|c| *c > 0)
                .unwrap_or(defaults.broadcast_capacity),
            rate_limit,
            static_dir,
        };

        tracing::info!(
            history_limit = config.history_limit,
            replay_history = config.replay_history,
            typing_timeout_ms = config.typing_timeout.as_millis() as u64,
            rate_limit_enabled = config.rate_limit.is_some(),
            "Chat config loaded"
        );

        config
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
