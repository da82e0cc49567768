//! Core server implementation and connection handling.
//!
//! This module contains the main game server structure and the logic
//! for handling client connections and server lifecycle management.

pub mod core;
pub mod handlers;

pub use core::GameServer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag coordinating graceful shutdown across server tasks.
///
/// Cloned into the accept loop and any supervising task; the signal handler
/// flips it once and every loop observes the change on its next iteration.
#[derive(Debug, Clone, Default)]
pub struct ShutdownState {
    initiated: Arc<AtomicBool>,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks shutdown as initiated. Idempotent.
    pub fn initiate_shutdown(&self) {
        self.initiated.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown_initiated(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }
}
