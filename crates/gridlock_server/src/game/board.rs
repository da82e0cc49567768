//! Board state for one game: occupied tiles and resolved territories.
//!
//! The board holds two parallel grids. `tiles` records which player occupies
//! each cell; entries are never vacated once set. `territories` records which
//! player has enclosed each cell; a cell with a territory owner is always
//! still empty in `tiles` - territory only ever exists on unoccupied cells.

use serde::{Deserialize, Serialize};

/// A single cell coordinate on the board.
///
/// `x` is the column and `y` the row; `(0, 0)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
}

impl Cell {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// A player color from the fixed session palette.
///
/// The palette is closed: a session holds at most five players, each with a
/// unique color. Serialized as the hex string clients render with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    #[serde(rename = "#32CD32")]
    Green,
    #[serde(rename = "#0080FF")]
    Blue,
    #[serde(rename = "#FF5733")]
    Orange,
    #[serde(rename = "#F3FF33")]
    Yellow,
    #[serde(rename = "#FF33F3")]
    Magenta,
}

impl Color {
    /// The full palette, in assignment order.
    pub const PALETTE: [Color; 5] = [
        Color::Green,
        Color::Blue,
        Color::Orange,
        Color::Yellow,
        Color::Magenta,
    ];

    /// The hex string clients render this color with.
    pub fn as_hex(&self) -> &'static str {
        match self {
            Color::Green => "#32CD32",
            Color::Blue => "#0080FF",
            Color::Orange => "#FF5733",
            Color::Yellow => "#F3FF33",
            Color::Magenta => "#FF33F3",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_hex())
    }
}

/// The square grid for one game session.
#[derive(Debug, Clone)]
pub struct Board {
    size: usize,
    tiles: Vec<Vec<Option<Color>>>,
    territories: Vec<Vec<Option<Color>>>,
}

impl Board {
    /// Creates an empty board with the given side length.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            tiles: vec![vec![None; size]; size],
            territories: vec![vec![None; size]; size],
        }
    }

    /// The board side length.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns true iff `(x, y)` is on the board and unoccupied.
    ///
    /// Pure query; callers must check this before [`Board::place_tile`].
    pub fn is_valid_move(&self, x: usize, y: usize) -> bool {
        x < self.size && y < self.size && self.tiles[y][x].is_none()
    }

    /// Occupies `(x, y)` with `color`.
    ///
    /// Precondition: `is_valid_move(x, y)` - the caller validates. Tiles are
    /// never vacated afterwards.
    pub fn place_tile(&mut self, x: usize, y: usize, color: Color) {
        self.tiles[y][x] = Some(color);
    }

    /// The occupant of `(x, y)`, if any. Out-of-bounds reads as empty.
    pub fn tile(&self, x: usize, y: usize) -> Option<Color> {
        self.tiles.get(y).and_then(|row| row.get(x)).copied().flatten()
    }

    /// The territory owner of `(x, y)`, if any.
    pub fn territory_owner(&self, x: usize, y: usize) -> Option<Color> {
        self.territories
            .get(y)
            .and_then(|row| row.get(x))
            .copied()
            .flatten()
    }

    /// Marks every cell in `cells` as territory of `color`.
    ///
    /// Idempotent when the cells already carry that color.
    pub fn claim_territory(&mut self, cells: &[Cell], color: Color) {
        for cell in cells {
            self.territories[cell.y][cell.x] = Some(color);
        }
    }

    /// Returns true iff every cell is occupied. The primary game-end trigger.
    pub fn is_full(&self) -> bool {
        self.tiles
            .iter()
            .all(|row| row.iter().all(|tile| tile.is_some()))
    }

    /// The occupancy grid, row-major, for state snapshots.
    pub fn tiles(&self) -> &[Vec<Option<Color>>] {
        &self.tiles
    }

    /// The territory grid, row-major, for state snapshots.
    pub fn territories(&self) -> &[Vec<Option<Color>>] {
        &self.territories
    }
}
