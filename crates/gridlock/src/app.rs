//! Main application logic and lifecycle management.
//!
//! This module contains the core `Application` struct that orchestrates
//! server startup, monitoring, and shutdown.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    signals::{setup_signal_handlers, setup_signal_handlers_silent},
};
use gridlock_server::{GameServer, ShutdownState};
use tracing::{error, info, warn};

/// Main application struct with monitoring capabilities.
///
/// The `Application` struct manages the complete lifecycle of the Gridlock
/// server, including configuration loading, server initialization, health
/// monitoring, and graceful shutdown handling.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Game server instance
    server: GameServer,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// Loads configuration, applies CLI overrides, validates settings, and
    /// initializes the game server.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    /// 5. Initialize game server with configuration
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // Apply CLI overrides
        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let server_config = config.to_server_config()?;
        let server = GameServer::new(server_config);

        info!("🚀 Gridlock Game Server v{}", env!("CARGO_PKG_VERSION"));
        info!(
            "📂 Config: {} | Default board: {}x{} | Max players/session: {}",
            args.config_path.display(),
            config.game.default_board_size,
            config.game.default_board_size,
            config.game.max_players_per_session
        );

        Ok(Self { config, server })
    }

    /// Runs the application until a shutdown signal arrives.
    ///
    /// Starts the server, sets up monitoring tasks, waits for shutdown
    /// signals, and performs graceful cleanup.
    ///
    /// # Monitoring Features
    ///
    /// * **Configuration Summary**: Displays key settings at startup
    /// * **Periodic Health Reports**: Session and connection counts every
    ///   60 seconds
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Gridlock Game Server Application");

        self.log_configuration_summary();

        // Grab handles for monitoring before moving the server
        let registry = self.server.registry();
        let connection_manager = self.server.connection_manager();
        let config = self.config.clone();

        let shutdown_state = ShutdownState::new();
        let shutdown_state_for_server = shutdown_state.clone();

        let server_handle = {
            let server = self.server;
            tokio::spawn(async move {
                match server.start_with_shutdown_state(shutdown_state_for_server).await {
                    Ok(()) => {
                        info!("✅ Server completed successfully");
                    }
                    Err(e) => {
                        error!("❌ Server error: {:?}", e);
                        std::process::exit(1);
                    }
                }
            })
        };

        // Periodic health reporting
        let monitoring_handle = {
            let registry = registry.clone();
            let connection_manager = connection_manager.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(60));

                loop {
                    interval.tick().await;
                    info!(
                        "📊 System Health - {} live sessions | {} connections",
                        registry.session_count().await,
                        connection_manager.connection_count().await
                    );
                }
            })
        };

        info!("✅ Gridlock Server is now running!");
        info!(
            "🎮 Ready to accept connections on {}",
            config.server.bind_address
        );
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        // Block until the first shutdown signal
        let signal_shutdown_state = setup_signal_handlers().await?;

        // A second signal skips the graceful path
        tokio::spawn(async move {
            if let Err(e) = setup_signal_handlers_silent().await {
                error!("Failed to set up second-signal handler: {e}");
                return;
            }

            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        if signal_shutdown_state.is_shutdown_initiated() {
            shutdown_state.initiate_shutdown();
        }

        info!("🛑 Shutdown signal received, beginning graceful shutdown...");
        monitoring_handle.abort();

        info!("⏳ Waiting for server task to complete gracefully...");
        server_handle.abort();
        if let Err(e) =
            tokio::time::timeout(tokio::time::Duration::from_secs(8), server_handle).await
        {
            warn!(
                "⏰ Server task did not complete within timeout, proceeding with cleanup: {:?}",
                e
            );
        } else {
            info!("✅ Server task completed gracefully");
        }

        // Give time for connection cleanup
        info!("⏳ Waiting for connections to close...");
        tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;

        info!("📊 Final Statistics:");
        info!("  - Live sessions: {}", registry.session_count().await);
        info!(
            "  - Open connections: {}",
            connection_manager.connection_count().await
        );

        info!("✅ Gridlock Game Server shutdown complete");
        Ok(())
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!(
            "  🗺️ Board sizes: default {}, max {}",
            self.config.game.default_board_size, self.config.game.max_board_size
        );
        info!(
            "  👥 Max players per session: {}",
            self.config.game.max_players_per_session
        );
        info!(
            "  👥 Max connections: {}",
            self.config.server.max_connections
        );
        info!(
            "  ⏱️ Connection timeout: {}s",
            self.config.server.connection_timeout
        );
    }
}
