//! Core game server implementation.
//!
//! This module contains the main `GameServer` struct and its implementation,
//! providing the central orchestration of all server components: the session
//! registry, connection management, and the accept loop.

use crate::{
    config::ServerConfig,
    connection::ConnectionManager,
    error::ServerError,
    registry::SessionRegistry,
    server::{handlers::handle_connection, ShutdownState},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// The core game server structure.
///
/// `GameServer` owns the session registry and connection manager and runs
/// the accept loop. Each accepted socket gets its own handler task; game
/// state is only ever touched through the registry's per-session locks.
///
/// # Architecture
///
/// * **Session Registry**: All live games, addressed by join code
/// * **Connection Management**: WebSocket connection lifecycle and player
///   mapping
/// * **Message Routing**: One decode-dispatch path from frames to game state
pub struct GameServer {
    /// Server configuration settings.
    config: ServerConfig,

    /// All live game sessions.
    registry: Arc<SessionRegistry>,

    /// Manager for client connections and messaging.
    connection_manager: Arc<ConnectionManager>,

    /// Channel for coordinating server shutdown.
    shutdown_sender: broadcast::Sender<()>,
}

impl GameServer {
    /// Creates a new game server with the specified configuration.
    ///
    /// The server is ready to start after construction; no sockets are
    /// bound until [`GameServer::start`].
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new(config.game.clone()));
        let connection_manager = Arc::new(ConnectionManager::new());
        let (shutdown_sender, _) = broadcast::channel(1);

        Self {
            config,
            registry,
            connection_manager,
            shutdown_sender,
        }
    }

    /// Starts the server and accepts connections until shutdown is
    /// requested through `shutdown_state`.
    pub async fn start_with_shutdown_state(
        &self,
        shutdown_state: ShutdownState,
    ) -> Result<(), ServerError> {
        self.start_internal(Some(shutdown_state)).await
    }

    /// Starts the server and accepts connections until an internal
    /// shutdown signal arrives.
    ///
    /// # Startup Sequence
    ///
    /// 1. Bind the TCP listener on the configured address
    /// 2. Accept connections, spawning one handler task per socket
    /// 3. Run until shutdown is requested
    ///
    /// # Returns
    ///
    /// `Ok(())` if the server started and stopped cleanly, or a
    /// `ServerError` if binding or accepting failed.
    pub async fn start(&self) -> Result<(), ServerError> {
        self.start_internal(None).await
    }

    async fn start_internal(&self, shutdown_state: Option<ShutdownState>) -> Result<(), ServerError> {
        info!("🚀 Starting game server on {}", self.config.bind_address);

        let listener = TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| ServerError::Network(format!("Failed to bind listener: {e}")))?;
        info!("✅ Listening on {}", self.config.bind_address);

        let mut shutdown_receiver = self.shutdown_sender.subscribe();

        let accept_loop = {
            let connection_manager = self.connection_manager.clone();
            let registry = self.registry.clone();
            let max_connections = self.config.max_connections;
            let shutdown_state = shutdown_state.clone();

            async move {
                loop {
                    if let Some(ref shutdown_state) = shutdown_state {
                        if shutdown_state.is_shutdown_initiated() {
                            info!("🛑 Accept loop stopping - shutdown initiated");
                            break;
                        }
                    }

                    match listener.accept().await {
                        Ok((stream, addr)) => {
                            if connection_manager.connection_count().await >= max_connections {
                                warn!("🚧 Connection limit reached, rejecting {}", addr);
                                drop(stream);
                                continue;
                            }

                            let connection_manager = connection_manager.clone();
                            let registry = registry.clone();

                            tokio::spawn(async move {
                                if let Err(e) =
                                    handle_connection(stream, addr, connection_manager, registry)
                                        .await
                                {
                                    error!("Connection error: {:?}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            break;
                        }
                    }
                }
            }
        };

        tokio::select! {
            _ = accept_loop => {}
            _ = shutdown_receiver.recv() => {
                info!("Internal shutdown signal received");
            }
        }

        info!("🧹 Performing server cleanup...");
        info!("Server stopped");
        Ok(())
    }

    /// Initiates server shutdown.
    ///
    /// Signals the accept loop to stop; in-flight connection handlers wind
    /// down as their sockets close.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("🛑 Shutting down server...");
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    /// The live-session registry.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// The connection manager.
    pub fn connection_manager(&self) -> Arc<ConnectionManager> {
        self.connection_manager.clone()
    }
}
