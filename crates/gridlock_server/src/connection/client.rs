//! Per-connection state.

use crate::game::PlayerId;
use crate::registry::SessionId;
use std::net::SocketAddr;
use std::time::SystemTime;

/// One connected client: identity, session membership, and metadata.
///
/// A connection gets its player ID at handshake time; the session link is
/// filled in once the client creates or joins a game and drives cleanup on
/// disconnect.
#[derive(Debug)]
pub struct ClientConnection {
    /// The player identity assigned to this connection at handshake.
    pub player_id: Option<PlayerId>,

    /// The session this connection belongs to, once it has joined one.
    pub session_id: Option<SessionId>,

    /// The remote network address of the client.
    pub remote_addr: SocketAddr,

    /// When this connection was established.
    pub connected_at: SystemTime,
}

impl ClientConnection {
    /// Creates a fresh connection record for `remote_addr`.
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            player_id: None,
            session_id: None,
            remote_addr,
            connected_at: SystemTime::now(),
        }
    }
}
