//! Territory resolution: flood-fill enclosure detection.
//!
//! After a tile is placed, each empty region adjacent to it is flood-filled
//! to decide whether the mover has enclosed it. A region is claimed iff the
//! fill never reaches the board edge and every occupied cell bordering the
//! region belongs to the mover. Claimed regions are written back to the
//! board's territory grid and their cells returned to the caller.

use super::board::{Board, Cell, Color};

const DIRECTIONS: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// One flood-filled empty region and what surrounds it.
struct Region {
    cells: Vec<Cell>,
    boundary: Vec<Cell>,
    /// True when the fill stepped off the board; an open region can never
    /// be enclosed.
    open: bool,
}

/// Computes which empty regions a just-placed tile encloses.
///
/// Holds a mutable borrow of the board for the duration of one resolution;
/// created transiently by the session each move.
pub struct TerritoryCalculator<'a> {
    board: &'a mut Board,
}

impl<'a> TerritoryCalculator<'a> {
    pub fn new(board: &'a mut Board) -> Self {
        Self { board }
    }

    /// Resolves territory around the move at `(last_x, last_y)` by `color`.
    ///
    /// Seeds from the up-to-4 empty orthogonal neighbors of the move. Each
    /// seed's maximal connected empty region is flood-filled at most once
    /// per call; regions that already carry a territory mark are skipped
    /// entirely (territory is claimed at most once per cell, permanently).
    ///
    /// Returns every newly claimed cell, aggregated across qualifying
    /// regions. Deterministic for a given board state and move.
    pub fn calculate_claimed_territories(
        &mut self,
        last_x: usize,
        last_y: usize,
        color: Color,
    ) -> Vec<Cell> {
        let size = self.board.size();
        let mut claimed = Vec::new();
        let mut visited = vec![false; size * size];

        for seed in self.adjacent_empty_cells(last_x, last_y) {
            if self.board.territory_owner(seed.x, seed.y).is_some() {
                continue;
            }
            if visited[seed.y * size + seed.x] {
                continue;
            }

            let region = self.flood_fill(seed, &mut visited);
            if self.is_enclosed_by(&region, color) {
                self.board.claim_territory(&region.cells, color);
                claimed.extend(region.cells);
            }
        }

        claimed
    }

    /// The empty orthogonal neighbors of `(x, y)`.
    fn adjacent_empty_cells(&self, x: usize, y: usize) -> Vec<Cell> {
        let size = self.board.size() as i64;
        let mut cells = Vec::new();

        for (dx, dy) in DIRECTIONS {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx < 0 || nx >= size || ny < 0 || ny >= size {
                continue;
            }
            let (nx, ny) = (nx as usize, ny as usize);
            if self.board.tile(nx, ny).is_none() {
                cells.push(Cell::new(nx, ny));
            }
        }

        cells
    }

    /// Flood-fills the maximal empty region containing `start`.
    ///
    /// Explicit work-list traversal, bounded by the number of cells; the
    /// shared `visited` grid keeps each cell from being processed more than
    /// once across all seeds of one resolution.
    fn flood_fill(&self, start: Cell, visited: &mut [bool]) -> Region {
        let size = self.board.size() as i64;
        let mut region = Region {
            cells: Vec::new(),
            boundary: Vec::new(),
            open: false,
        };

        let mut work = vec![start];
        visited[start.y * self.board.size() + start.x] = true;

        while let Some(cell) = work.pop() {
            region.cells.push(cell);

            for (dx, dy) in DIRECTIONS {
                let nx = cell.x as i64 + dx;
                let ny = cell.y as i64 + dy;
                if nx < 0 || nx >= size || ny < 0 || ny >= size {
                    // Stepping off the board means the region is open.
                    region.open = true;
                    continue;
                }
                let (nx, ny) = (nx as usize, ny as usize);
                if self.board.tile(nx, ny).is_some() {
                    region.boundary.push(Cell::new(nx, ny));
                    continue;
                }
                let idx = ny * self.board.size() + nx;
                if !visited[idx] {
                    visited[idx] = true;
                    work.push(Cell::new(nx, ny));
                }
            }
        }

        region
    }

    /// Enclosure rule: closed, non-trivially bounded, and every boundary
    /// occupant is the mover's color.
    fn is_enclosed_by(&self, region: &Region, color: Color) -> bool {
        if region.open || region.boundary.is_empty() {
            return false;
        }
        region
            .boundary
            .iter()
            .all(|cell| self.board.tile(cell.x, cell.y) == Some(color))
    }
}
