//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize and customize the game server behavior.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Configuration structure for the game server.
///
/// Contains all necessary parameters to configure server behavior including
/// network settings, connection limits, and game rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Connection timeout in seconds
    pub connection_timeout: u64,

    /// Game rule configuration settings
    pub game: GameConfig,
}

/// Game rule configuration for session creation and board limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Board side length used when a client does not request one
    pub default_board_size: usize,

    /// Largest board side length a client may request
    pub max_board_size: usize,

    /// Maximum number of players in one session
    pub max_players_per_session: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".parse().expect("Invalid default bind address"),
            max_connections: 1000,
            connection_timeout: 60,
            game: GameConfig::default(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            default_board_size: 10,
            max_board_size: 32,
            max_players_per_session: 5,
        }
    }
}
