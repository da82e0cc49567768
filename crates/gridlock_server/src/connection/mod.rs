//! Client connection tracking and message delivery.
//!
//! Each WebSocket gets a numeric connection ID at accept time. The
//! [`manager::ConnectionManager`] maps connections to their player identity
//! and session membership, and fans outgoing frames to per-connection
//! writer tasks through a broadcast channel.

pub mod client;
pub mod manager;

pub use client::ClientConnection;
pub use manager::ConnectionManager;

/// Unique identifier for a client connection, assigned at accept time.
pub type ConnectionId = usize;
