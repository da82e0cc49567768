//! Configuration management for the Gridlock game server.
//!
//! This module handles loading, validation, and conversion of server
//! configuration from TOML files and command-line arguments.

use gridlock_server::{GameConfig, ServerConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

fn default_max_connections() -> usize {
    1000
}

fn default_connection_timeout() -> u64 {
    60
}

fn default_board_size() -> usize {
    10
}

fn default_max_board_size() -> usize {
    32
}

fn default_max_players() -> usize {
    5
}

/// Application configuration loaded from TOML file.
///
/// This is the main configuration structure that encompasses all server
/// settings including networking, game rules, and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration settings
    pub server: ServerSettings,
    /// Game rule settings
    #[serde(default)]
    pub game: GameSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Server-specific configuration settings.
///
/// Controls network binding, connection limits, and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

/// Game rule configuration.
///
/// Controls board sizing and session capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSettings {
    /// Board side length used when a client does not request one
    #[serde(default = "default_board_size")]
    pub default_board_size: usize,
    /// Largest board side length a client may request
    #[serde(default = "default_max_board_size")]
    pub max_board_size: usize,
    /// Maximum players in one session (bounded by the color palette)
    #[serde(default = "default_max_players")]
    pub max_players_per_session: usize,
}

/// Logging system configuration.
///
/// Controls log output format, levels, and destination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
    /// Optional file path for log output (None means stdout only)
    pub file_path: Option<String>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            default_board_size: default_board_size(),
            max_board_size: default_max_board_size(),
            max_players_per_session: default_max_players(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "127.0.0.1:8080".to_string(),
                max_connections: default_max_connections(),
                connection_timeout: default_connection_timeout(),
            },
            game: GameSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
                file_path: None,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at
    /// the specified path and returns the default configuration.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the application configuration to a game server configuration.
    ///
    /// Translates the TOML-based configuration into the types expected by
    /// the game server core.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_connections: self.server.max_connections,
            connection_timeout: self.server.connection_timeout,
            game: GameConfig {
                default_board_size: self.game.default_board_size,
                max_board_size: self.game.max_board_size,
                max_players_per_session: self.game.max_players_per_session,
            },
        })
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing
    /// the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self
            .server
            .bind_address
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(format!(
                "Invalid bind address: {}",
                &self.server.bind_address
            ));
        }

        if self.game.default_board_size < 2 {
            return Err("game.default_board_size must be at least 2".to_string());
        }
        if self.game.max_board_size < self.game.default_board_size {
            return Err(
                "game.max_board_size must be at least game.default_board_size".to_string(),
            );
        }
        // The color palette caps sessions at five players.
        if self.game.max_players_per_session < 2 || self.game.max_players_per_session > 5 {
            return Err("game.max_players_per_session must be between 2 and 5".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use tokio::fs;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.server.bind_address, "127.0.0.1:8080");
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.server.connection_timeout, 60);

        assert_eq!(config.game.default_board_size, 10);
        assert_eq!(config.game.max_board_size, 32);
        assert_eq!(config.game.max_players_per_session, 5);

        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert!(config.logging.file_path.is_none());
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[server]
bind_address = "0.0.0.0:3000"
max_connections = 2000
connection_timeout = 90

[game]
default_board_size = 12
max_board_size = 24
max_players_per_session = 4

[logging]
level = "debug"
json_format = true
file_path = "/tmp/test.log"
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(&temp_file.path().to_path_buf())
            .await
            .unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0:3000");
        assert_eq!(config.server.max_connections, 2000);
        assert_eq!(config.server.connection_timeout, 90);
        assert_eq!(config.game.default_board_size, 12);
        assert_eq!(config.game.max_board_size, 24);
        assert_eq!(config.game.max_players_per_session, 4);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert_eq!(config.logging.file_path, Some("/tmp/test.log".to_string()));
    }

    #[tokio::test]
    async fn test_load_creates_default_file_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:8080");
        assert!(path.exists());
    }

    #[test]
    fn test_serde_deserialization_with_defaults() {
        let toml_content = r#"
[server]
bind_address = "127.0.0.1:8080"

[logging]
level = "info"
json_format = false
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();

        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.server.connection_timeout, 60);
        assert_eq!(config.game.default_board_size, 10);
        assert_eq!(config.game.max_players_per_session, 5);
        assert!(config.logging.file_path.is_none());
    }

    #[test]
    fn test_to_server_config_conversion() {
        let mut config = AppConfig::default();
        config.server.bind_address = "192.168.1.100:8080".to_string();
        config.server.max_connections = 3000;
        config.game.default_board_size = 16;

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.bind_address.to_string(), "192.168.1.100:8080");
        assert_eq!(server_config.max_connections, 3000);
        assert_eq!(server_config.game.default_board_size, 16);
    }

    #[test]
    fn test_validation_valid_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_bind_address() {
        let mut config = AppConfig::default();
        config.server.bind_address = "invalid_address".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Invalid bind address"));
    }

    #[test]
    fn test_validation_board_size_bounds() {
        let mut config = AppConfig::default();
        config.game.default_board_size = 1;
        assert!(config.validate().is_err());

        config.game.default_board_size = 20;
        config.game.max_board_size = 10;
        assert!(config.validate().is_err());

        config.game.max_board_size = 20;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_player_cap_bounds() {
        let mut config = AppConfig::default();
        config.game.max_players_per_session = 1;
        assert!(config.validate().is_err());

        config.game.max_players_per_session = 6;
        assert!(config.validate().is_err());

        config.game.max_players_per_session = 3;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "invalid_level".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Invalid log level"));
    }
}
