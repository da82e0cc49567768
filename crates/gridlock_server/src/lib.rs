//! # Gridlock Server - Territory Game Engine
//!
//! A WebSocket game server for a grid-based territory-claiming game: players
//! alternately occupy empty cells, and contiguous empty regions fully
//! surrounded by one player's tiles become that player's territory.
//!
//! ## Architecture Overview
//!
//! The crate separates the game engine from the transport that drives it:
//!
//! * **Game engine** ([`game`]) - Board state, territory resolution via flood
//!   fill, per-cell locking with deadlock detection, and the per-session turn
//!   state machine. Pure computation, no I/O.
//! * **Session registry** ([`SessionRegistry`]) - Owns the mapping from
//!   session code to live game session and routes operations to the right
//!   session. Sessions are created and destroyed explicitly; there is no
//!   ambient global state.
//! * **Message routing** ([`messaging`]) - Decodes inbound JSON frames into a
//!   tagged request enum, dispatches them exhaustively, and fans the
//!   resulting events out to session participants.
//! * **Connection management** - WebSocket lifecycle, player identity
//!   assignment, and per-session broadcasting.
//!
//! ## Message Flow
//!
//! 1. Client sends a WebSocket text frame with `{type, payload}` structure
//! 2. The router parses it into a [`messaging::Request`] variant
//! 3. The registry resolves the target session; the operation runs under
//!    that session's lock
//! 4. Replies (including lock state) go to the requester; board updates,
//!    join/leave announcements, and game-over events are broadcast to
//!    everyone in the session
//!
//! ## Concurrency Model
//!
//! Every session is wrapped in its own `tokio::sync::Mutex`, so all
//! read-modify-write operations on one game (moves, lock requests, roster
//! changes) are serialized against each other while distinct sessions run
//! fully in parallel. Nothing inside the engine blocks on I/O; once the
//! session lock is held an operation completes synchronously.
//!
//! ## Locking and Deadlock
//!
//! Players may reserve cells ahead of a claim with `requestLock`. Contended
//! requests are denied and recorded in a wait-for graph; a cycle in that
//! graph means no participant can make progress, which is treated as fatal:
//! all participants receive `deadlockDetected` and the session is torn down.
//!
//! ## Error Handling
//!
//! Infrastructure failures use the structured [`ServerError`] type. Game
//! rule violations (wrong turn, occupied cell, game not started) are typed
//! rejection values returned to the caller - never panics, and never fatal
//! to the session.

// Re-export core types and functions for easy access
pub use config::{GameConfig, ServerConfig};
pub use error::ServerError;
pub use registry::{SessionId, SessionRegistry};
pub use server::{GameServer, ShutdownState};
pub use utils::{create_server, create_server_with_config};

// Public module declarations
pub mod config;
pub mod connection;
pub mod error;
pub mod game;
pub mod messaging;
pub mod registry;
pub mod server;
pub mod utils;

mod tests;
