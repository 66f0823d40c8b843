// Public API for integration tests and potential library usage

pub mod api;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod protocol;
pub mod rate_limit;
pub mod server;
pub mod state;
pub mod types;
pub mod ws;
