//! Player identity and per-session player state.

use super::board::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, server-assigned player identity, scoped to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    /// Generates a fresh random identity.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One player in a session: identity, display name, palette color, and the
/// number of cells they have enclosed so far.
#[derive(Debug, Clone)]
pub struct Player {
    id: PlayerId,
    name: String,
    color: Color,
    territory: usize,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, color: Color) -> Self {
        Self {
            id,
            name: name.into(),
            color,
            territory: 0,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Total cells enclosed by this player.
    pub fn territory(&self) -> usize {
        self.territory
    }

    /// Credits `count` newly enclosed cells.
    pub fn add_territories(&mut self, count: usize) {
        self.territory += count;
    }

    /// The wire-shape projection used in board snapshots and score lists.
    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            id: self.id,
            name: self.name.clone(),
            color: self.color,
            territory: self.territory,
        }
    }
}

/// Serializable projection of a player for board state and scoreboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
    pub color: Color,
    pub territory: usize,
}
