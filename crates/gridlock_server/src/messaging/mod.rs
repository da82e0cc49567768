//! Wire protocol: message types and routing.
//!
//! Every WebSocket text frame is a JSON envelope with a `type` tag and a
//! `payload` object. [`types`] defines both directions of the vocabulary;
//! [`router`] decodes client frames and drives the game state.

pub mod router;
pub mod types;

pub use router::route_client_message;
pub use types::{BoardState, Request, ServerEvent};
