//! Utility functions for server creation and common operations.

use crate::config::ServerConfig;
use crate::server::GameServer;
use std::time::{SystemTime, UNIX_EPOCH};

/// Creates a game server with default configuration.
///
/// Suitable for local development; production deployments should build a
/// [`ServerConfig`] and use [`create_server_with_config`].
pub fn create_server() -> GameServer {
    GameServer::new(ServerConfig::default())
}

/// Creates a game server with the given configuration.
pub fn create_server_with_config(config: ServerConfig) -> GameServer {
    GameServer::new(config)
}

/// Milliseconds since the Unix epoch, for `syncTime` replies.
///
/// A clock before the epoch reads as zero rather than failing.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
