//! The per-game session state machine.
//!
//! A session owns one board, the ordered player roster (insertion order is
//! turn order), the turn pointer, and the session's lock table. All mutation
//! goes through the methods here, and the transport layer serializes calls
//! per session, so the state machine never sees interleaved updates.

use super::board::{Board, Cell, Color};
use super::locks::{LockManager, LockRequest};
use super::player::{Player, PlayerId, PlayerSummary};
use super::territory::TerritoryCalculator;
use crate::registry::SessionId;

/// Players needed before the game starts.
const MIN_PLAYERS_TO_START: usize = 2;

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Fewer than two players present; moves are rejected.
    WaitingForPlayers,
    /// The game is live and moves are accepted.
    InProgress,
    /// Terminal: board filled or the session was torn down.
    Over,
}

/// Why a move was rejected. Recoverable; reported to the requester only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveRejection {
    #[error("Not your turn")]
    NotYourTurn,
    #[error("Game not started")]
    GameNotStarted,
    #[error("Invalid move position")]
    InvalidMove,
}

/// Result of a successful move.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    /// Cells newly enclosed by this move, across all qualifying regions.
    pub claimed_territories: Vec<Cell>,
    /// The player now holding the turn.
    pub new_turn: Option<PlayerId>,
    /// True when this move filled the board.
    pub game_over: bool,
}

/// Result of a lock request, after deadlock detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Granted,
    Denied {
        /// True when this denial closed a wait-for cycle; the session has
        /// already transitioned to [`SessionState::Over`].
        deadlock: bool,
    },
}

/// One in-progress game: board, roster, turn pointer, and lock state.
#[derive(Debug)]
pub struct GameSession {
    id: SessionId,
    board: Board,
    players: Vec<Player>,
    current_turn: Option<PlayerId>,
    state: SessionState,
    locks: LockManager,
}

impl GameSession {
    /// Creates an empty session around a fresh board.
    pub fn new(id: SessionId, board_size: usize) -> Self {
        Self {
            id,
            board: Board::new(board_size),
            players: Vec::new(),
            current_turn: None,
            state: SessionState::WaitingForPlayers,
            locks: LockManager::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_turn(&self) -> Option<PlayerId> {
        self.current_turn
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn has_player(&self, id: PlayerId) -> bool {
        self.players.iter().any(|p| p.id() == id)
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// The first palette color not yet taken by a player in this session.
    pub fn next_free_color(&self) -> Option<Color> {
        Color::PALETTE
            .into_iter()
            .find(|color| self.players.iter().all(|p| p.color() != *color))
    }

    /// Appends a player to the roster.
    ///
    /// The first player to join takes the turn; the game starts once the
    /// roster reaches two. Roster capacity is the caller's concern.
    pub fn add_player(&mut self, id: PlayerId, name: &str, color: Color) -> &Player {
        self.players.push(Player::new(id, name, color));
        let index = self.players.len() - 1;

        if self.players.len() == 1 {
            self.current_turn = Some(id);
        }
        if self.players.len() >= MIN_PLAYERS_TO_START
            && self.state == SessionState::WaitingForPlayers
        {
            self.state = SessionState::InProgress;
        }

        &self.players[index]
    }

    /// Removes a player, passing the turn to their roster successor.
    ///
    /// Their locks and wait-for edges are dropped with them. If fewer than
    /// two players remain the game reverts to waiting (paused, not
    /// destroyed).
    pub fn remove_player(&mut self, id: PlayerId) {
        let Some(index) = self.players.iter().position(|p| p.id() == id) else {
            return;
        };
        let held_turn = self.current_turn == Some(id);
        self.players.remove(index);
        self.locks.remove_player(id);

        if self.players.is_empty() {
            self.current_turn = None;
        } else if held_turn {
            // The player who followed the leaver in roster order, with
            // wraparound.
            let successor = index % self.players.len();
            self.current_turn = Some(self.players[successor].id());
        }

        if self.players.len() < MIN_PLAYERS_TO_START && self.state == SessionState::InProgress {
            self.state = SessionState::WaitingForPlayers;
        }
    }

    /// Validates and applies a move by `player` at `(x, y)`.
    ///
    /// On success the tile is placed, enclosed territory resolved and
    /// credited to the mover, and the turn advances cyclically. All
    /// rejections are explicit values; no partial mutation on failure.
    pub fn place_tile(
        &mut self,
        player: PlayerId,
        x: usize,
        y: usize,
    ) -> Result<MoveOutcome, MoveRejection> {
        if self.current_turn != Some(player) {
            return Err(MoveRejection::NotYourTurn);
        }
        if self.state != SessionState::InProgress {
            return Err(MoveRejection::GameNotStarted);
        }
        if !self.board.is_valid_move(x, y) {
            return Err(MoveRejection::InvalidMove);
        }

        let color = self
            .players
            .iter()
            .find(|p| p.id() == player)
            .map(|p| p.color())
            .ok_or(MoveRejection::NotYourTurn)?;

        self.board.place_tile(x, y, color);
        let claimed =
            TerritoryCalculator::new(&mut self.board).calculate_claimed_territories(x, y, color);

        if let Some(mover) = self.players.iter_mut().find(|p| p.id() == player) {
            mover.add_territories(claimed.len());
        }

        let game_over = self.board.is_full();
        if game_over {
            self.state = SessionState::Over;
        }
        self.advance_turn();

        Ok(MoveOutcome {
            claimed_territories: claimed,
            new_turn: self.current_turn,
            game_over,
        })
    }

    /// Passes the turn voluntarily. Only the turn holder may do so while the
    /// game is in progress; anything else is ignored.
    pub fn end_turn(&mut self, player: PlayerId) -> bool {
        if self.state == SessionState::InProgress && self.current_turn == Some(player) {
            self.advance_turn();
            true
        } else {
            false
        }
    }

    /// Moves the turn pointer to the cyclic successor in roster order.
    ///
    /// A turn-timeout policy outside the engine calls this through
    /// [`GameSession::end_turn`]; an empty roster is a defensive no-op.
    pub fn advance_turn(&mut self) {
        if self.players.is_empty() {
            return;
        }
        let index = self
            .current_turn
            .and_then(|current| self.players.iter().position(|p| p.id() == current));
        let next = match index {
            Some(i) => (i + 1) % self.players.len(),
            None => 0,
        };
        self.current_turn = Some(self.players[next].id());
    }

    /// Requests the per-cell lock for `player`.
    ///
    /// A denial that closes a wait-for cycle is fatal: the session
    /// transitions to `Over` and the caller broadcasts the deadlock signal.
    pub fn request_lock(&mut self, player: PlayerId, cell: Cell) -> LockOutcome {
        match self.locks.request_lock(player, cell) {
            LockRequest::Granted => LockOutcome::Granted,
            LockRequest::Denied { deadlock, .. } => {
                if deadlock {
                    self.state = SessionState::Over;
                }
                LockOutcome::Denied { deadlock }
            }
        }
    }

    /// Releases the per-cell lock if `player` holds it.
    pub fn release_lock(&mut self, player: PlayerId, cell: Cell) -> bool {
        self.locks.release_lock(player, cell)
    }

    /// True once the board has filled.
    pub fn is_game_over(&self) -> bool {
        self.board.is_full()
    }

    /// Final or interim standings: territory descending, roster order on
    /// ties (stable sort).
    pub fn scores(&self) -> Vec<PlayerSummary> {
        let mut scores: Vec<PlayerSummary> = self.players.iter().map(Player::summary).collect();
        scores.sort_by(|a, b| b.territory.cmp(&a.territory));
        scores
    }
}
