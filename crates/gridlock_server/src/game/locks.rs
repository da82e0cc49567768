//! Per-cell exclusive locks and wait-for deadlock detection.
//!
//! Players reserve a cell before attempting to claim it. At most one player
//! holds a cell at a time; a denied request records an edge in the wait-for
//! graph (waiter -> holder). A cycle in that graph means every participant
//! on it is waiting for a cell another one holds, with no forward progress
//! possible - the session treats that as fatal.

use super::board::Cell;
use super::player::PlayerId;
use std::collections::{HashMap, HashSet};

/// Outcome of a single lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockRequest {
    /// The requester now holds the cell (or already held it).
    Granted,
    /// The cell is held by someone else; the wait was recorded.
    Denied {
        holder: PlayerId,
        /// True when recording this wait closed a cycle in the wait-for
        /// graph.
        deadlock: bool,
    },
}

/// Lock table and wait-for graph for one session.
///
/// Owned exclusively by a [`super::GameSession`]; all mutation happens under
/// the session's lock, so the table never sees interleaved updates.
#[derive(Debug, Default)]
pub struct LockManager {
    locks: HashMap<Cell, PlayerId>,
    wait_for: HashMap<PlayerId, HashSet<PlayerId>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the exclusive lock on `cell` for `player`.
    ///
    /// Granting a free cell also clears any stale wait entry the requester
    /// accumulated while blocked. Re-requesting a cell the player already
    /// holds is an idempotent grant. On contention the wait edge is recorded
    /// first and cycle detection runs over the updated graph.
    pub fn request_lock(&mut self, player: PlayerId, cell: Cell) -> LockRequest {
        match self.locks.get(&cell) {
            None => {
                self.locks.insert(cell, player);
                self.wait_for.remove(&player);
                LockRequest::Granted
            }
            Some(&holder) if holder == player => LockRequest::Granted,
            Some(&holder) => {
                self.wait_for.entry(player).or_default().insert(holder);
                let deadlock = self.has_cycle();
                LockRequest::Denied { holder, deadlock }
            }
        }
    }

    /// Releases `cell` if `player` holds it.
    ///
    /// Releasing a lock the player does not hold is silently ignored.
    /// Returns true when the table changed.
    pub fn release_lock(&mut self, player: PlayerId, cell: Cell) -> bool {
        if self.locks.get(&cell) == Some(&player) {
            self.locks.remove(&cell);
            true
        } else {
            false
        }
    }

    /// Drops every lock held by `player` and any wait state involving them.
    ///
    /// Called when a player leaves the session, so departed players cannot
    /// pin cells or keep phantom edges in the graph.
    pub fn remove_player(&mut self, player: PlayerId) {
        self.locks.retain(|_, holder| *holder != player);
        self.wait_for.remove(&player);
        for waiting_on in self.wait_for.values_mut() {
            waiting_on.remove(&player);
        }
        self.wait_for.retain(|_, waiting_on| !waiting_on.is_empty());
    }

    /// The current holder of `cell`, if any.
    pub fn holder(&self, cell: Cell) -> Option<PlayerId> {
        self.locks.get(&cell).copied()
    }

    /// The set of players `player` is currently blocked on.
    pub fn waiting_on(&self, player: PlayerId) -> Option<&HashSet<PlayerId>> {
        self.wait_for.get(&player)
    }

    /// The lock table in wire shape: `"x,y" -> holder`.
    pub fn snapshot(&self) -> HashMap<String, PlayerId> {
        self.locks
            .iter()
            .map(|(cell, holder)| (format!("{},{}", cell.x, cell.y), *holder))
            .collect()
    }

    /// Depth-first cycle search over the wait-for graph.
    ///
    /// Nodes are players with outstanding waits; an edge waiter -> holder
    /// means the waiter is blocked on a lock the holder owns. A node
    /// revisited while still on the active search path closes a cycle.
    fn has_cycle(&self) -> bool {
        let mut visited: HashSet<PlayerId> = HashSet::new();
        let mut on_stack: HashSet<PlayerId> = HashSet::new();

        for &root in self.wait_for.keys() {
            if visited.contains(&root) {
                continue;
            }
            visited.insert(root);
            on_stack.insert(root);
            let mut stack: Vec<(PlayerId, Vec<PlayerId>, usize)> =
                vec![(root, self.edges_from(root), 0)];

            loop {
                let (node, next) = match stack.last_mut() {
                    None => break,
                    Some((node, edges, cursor)) => {
                        if *cursor < edges.len() {
                            let next = edges[*cursor];
                            *cursor += 1;
                            (*node, Some(next))
                        } else {
                            (*node, None)
                        }
                    }
                };

                match next {
                    None => {
                        on_stack.remove(&node);
                        stack.pop();
                    }
                    Some(next) => {
                        if on_stack.contains(&next) {
                            return true;
                        }
                        if visited.insert(next) {
                            on_stack.insert(next);
                            let edges = self.edges_from(next);
                            stack.push((next, edges, 0));
                        }
                    }
                }
            }
        }

        false
    }

    fn edges_from(&self, player: PlayerId) -> Vec<PlayerId> {
        self.wait_for
            .get(&player)
            .map(|holders| holders.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contended_cell_is_denied_and_wait_recorded() {
        let mut locks = LockManager::new();
        let (p1, p2) = (PlayerId::new(), PlayerId::new());
        let cell = Cell::new(2, 2);

        assert_eq!(locks.request_lock(p1, cell), LockRequest::Granted);
        assert_eq!(
            locks.request_lock(p2, cell),
            LockRequest::Denied { holder: p1, deadlock: false }
        );
        assert!(locks.waiting_on(p2).unwrap().contains(&p1));

        assert!(locks.release_lock(p1, cell));
        assert_eq!(locks.request_lock(p2, cell), LockRequest::Granted);
        // The stale wait entry is cleared on grant.
        assert!(locks.waiting_on(p2).is_none());
    }

    #[test]
    fn re_requesting_a_held_cell_is_an_idempotent_grant() {
        let mut locks = LockManager::new();
        let p1 = PlayerId::new();
        let cell = Cell::new(0, 0);

        assert_eq!(locks.request_lock(p1, cell), LockRequest::Granted);
        assert_eq!(locks.request_lock(p1, cell), LockRequest::Granted);
        assert_eq!(locks.holder(cell), Some(p1));
    }

    #[test]
    fn releasing_an_unheld_lock_is_a_no_op() {
        let mut locks = LockManager::new();
        let (p1, p2) = (PlayerId::new(), PlayerId::new());
        let cell = Cell::new(1, 1);

        locks.request_lock(p1, cell);
        assert!(!locks.release_lock(p2, cell));
        assert!(!locks.release_lock(p2, Cell::new(3, 3)));
        assert_eq!(locks.holder(cell), Some(p1));
        assert!(locks.waiting_on(p2).is_none());
    }

    #[test]
    fn circular_wait_is_detected_as_deadlock() {
        let mut locks = LockManager::new();
        let (p1, p2) = (PlayerId::new(), PlayerId::new());
        let (a, b) = (Cell::new(0, 0), Cell::new(1, 1));

        assert_eq!(locks.request_lock(p1, a), LockRequest::Granted);
        assert_eq!(locks.request_lock(p2, b), LockRequest::Granted);

        // p1 waits on p2: no cycle yet.
        assert_eq!(
            locks.request_lock(p1, b),
            LockRequest::Denied { holder: p2, deadlock: false }
        );
        // p2 waits on p1: closes the cycle.
        assert_eq!(
            locks.request_lock(p2, a),
            LockRequest::Denied { holder: p1, deadlock: true }
        );
    }

    #[test]
    fn three_party_cycle_is_detected() {
        let mut locks = LockManager::new();
        let (p1, p2, p3) = (PlayerId::new(), PlayerId::new(), PlayerId::new());
        let (a, b, c) = (Cell::new(0, 0), Cell::new(1, 0), Cell::new(2, 0));

        locks.request_lock(p1, a);
        locks.request_lock(p2, b);
        locks.request_lock(p3, c);

        assert_eq!(
            locks.request_lock(p1, b),
            LockRequest::Denied { holder: p2, deadlock: false }
        );
        assert_eq!(
            locks.request_lock(p2, c),
            LockRequest::Denied { holder: p3, deadlock: false }
        );
        assert_eq!(
            locks.request_lock(p3, a),
            LockRequest::Denied { holder: p1, deadlock: true }
        );
    }

    #[test]
    fn removing_a_player_drops_their_locks_and_edges() {
        let mut locks = LockManager::new();
        let (p1, p2) = (PlayerId::new(), PlayerId::new());
        let cell = Cell::new(4, 4);

        locks.request_lock(p1, cell);
        locks.request_lock(p2, cell);
        locks.remove_player(p1);

        assert_eq!(locks.holder(cell), None);
        assert!(locks.waiting_on(p2).is_none());
        assert_eq!(locks.request_lock(p2, cell), LockRequest::Granted);
    }

    #[test]
    fn snapshot_uses_coordinate_keys() {
        let mut locks = LockManager::new();
        let p1 = PlayerId::new();
        locks.request_lock(p1, Cell::new(3, 7));

        let snapshot = locks.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("3,7"), Some(&p1));
    }
}
