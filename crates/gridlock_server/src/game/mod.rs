//! The territory game engine.
//!
//! Pure game state and rules: the board, territory resolution, per-cell
//! locking with deadlock detection, and the per-session turn state machine.
//! Nothing in this module performs I/O; the transport layer drives it
//! through the session registry.

pub mod board;
pub mod locks;
pub mod player;
pub mod session;
pub mod territory;

pub use board::{Board, Cell, Color};
pub use locks::{LockManager, LockRequest};
pub use player::{Player, PlayerId, PlayerSummary};
pub use session::{GameSession, LockOutcome, MoveOutcome, MoveRejection, SessionState};
pub use territory::TerritoryCalculator;
