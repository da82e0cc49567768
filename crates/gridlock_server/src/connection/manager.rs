//! Connection manager for tracking and managing client connections.
//!
//! Connection handlers never write to each other's sockets directly: every
//! outgoing frame goes through one broadcast channel tagged with its target
//! connection ID, and each connection's writer task forwards only its own
//! frames.

use super::{client::ClientConnection, ConnectionId};
use crate::game::PlayerId;
use crate::registry::SessionId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info};

/// Central manager for all client connections.
///
/// Tracks active connections, assigns unique IDs, records player identity
/// and session membership per connection, and queues outgoing frames. Uses
/// async-safe data structures for concurrent access from the connection
/// handlers.
#[derive(Debug)]
pub struct ConnectionManager {
    /// Map of connection ID to client connection information.
    connections: Arc<RwLock<HashMap<ConnectionId, ClientConnection>>>,

    /// Atomic counter for generating unique connection IDs.
    next_id: Arc<AtomicUsize>,

    /// Broadcast sender for outgoing frames, tagged with the target
    /// connection.
    sender: broadcast::Sender<(ConnectionId, Vec<u8>)>,
}

impl ConnectionManager {
    /// Creates a new connection manager with an empty connection table.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicUsize::new(1)),
            sender,
        }
    }

    /// Adds a new connection and returns its unique ID.
    pub async fn add_connection(&self, remote_addr: SocketAddr) -> ConnectionId {
        let connection_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let connection = ClientConnection::new(remote_addr);
        let mut connections = self.connections.write().await;
        connections.insert(connection_id, connection);
        info!("🔗 Connection {} from {}", connection_id, remote_addr);
        connection_id
    }

    /// Removes a connection from the manager.
    ///
    /// Called when a client disconnects or times out; session-side cleanup
    /// is the handler's job.
    pub async fn remove_connection(&self, connection_id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.remove(&connection_id) {
            info!(
                "❌ Connection {} from {} disconnected",
                connection_id, connection.remote_addr
            );
        }
    }

    /// Associates a player identity with a connection.
    pub async fn set_player_id(&self, connection_id: ConnectionId, player_id: PlayerId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&connection_id) {
            connection.player_id = Some(player_id);
        }
    }

    /// The player identity assigned to a connection, if any.
    pub async fn get_player_id(&self, connection_id: ConnectionId) -> Option<PlayerId> {
        let connections = self.connections.read().await;
        connections.get(&connection_id).and_then(|c| c.player_id)
    }

    /// Records which session a connection belongs to.
    ///
    /// Set when the client creates or joins a game; read back on disconnect
    /// to know which session to clean up.
    pub async fn set_session(&self, connection_id: ConnectionId, session_id: SessionId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&connection_id) {
            connection.session_id = Some(session_id);
        }
    }

    /// The session a connection belongs to, if it has joined one.
    pub async fn get_session(&self, connection_id: ConnectionId) -> Option<SessionId> {
        let connections = self.connections.read().await;
        connections
            .get(&connection_id)
            .and_then(|c| c.session_id.clone())
    }

    /// Queues a frame for delivery to one connection.
    pub async fn send_to_connection(&self, connection_id: ConnectionId, message: Vec<u8>) {
        if let Err(e) = self.sender.send((connection_id, message)) {
            error!(
                "Failed to send message to connection {}: {:?}",
                connection_id, e
            );
        }
    }

    /// Queues a frame for every member of `session_id`.
    ///
    /// `skip` excludes one connection, used when the originator already got
    /// a direct reply. Returns the number of connections the frame was
    /// queued for.
    pub async fn broadcast_to_session(
        &self,
        session_id: &SessionId,
        message: Vec<u8>,
        skip: Option<ConnectionId>,
    ) -> usize {
        let connections = self.connections.read().await;
        let mut sent = 0;

        for (&connection_id, connection) in connections.iter() {
            if connection.session_id.as_ref() != Some(session_id) {
                continue;
            }
            if skip == Some(connection_id) {
                continue;
            }
            if let Err(e) = self.sender.send((connection_id, message.clone())) {
                error!(
                    "Failed to broadcast message to connection {}: {:?}",
                    connection_id, e
                );
            } else {
                sent += 1;
            }
        }

        debug!("📡 Broadcast to {} connections in session {}", sent, session_id);
        sent
    }

    /// Creates a new receiver for outgoing frames.
    ///
    /// Each connection's writer task subscribes and forwards only frames
    /// tagged with its own connection ID.
    pub fn subscribe(&self) -> broadcast::Receiver<(ConnectionId, Vec<u8>)> {
        self.sender.subscribe()
    }

    /// Number of currently tracked connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
