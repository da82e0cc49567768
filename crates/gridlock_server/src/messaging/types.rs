//! Message type definitions for client-server communication.
//!
//! Both directions share one envelope shape: a `type` tag naming the
//! operation and a `payload` object carrying its fields. Unknown tags fail
//! to decode and are dropped by the router.

use crate::game::{Cell, Color, GameSession, PlayerId, PlayerSummary};
use crate::registry::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A message sent from a client to the server.
///
/// # Examples
///
/// Creating a game:
/// ```json
/// {
///   "type": "createGame",
///   "payload": { "playerName": "alice", "boardSize": 10 }
/// }
/// ```
///
/// Claiming a tile:
/// ```json
/// {
///   "type": "claimTile",
///   "payload": { "gameId": "X7K2P9", "playerId": "…", "x": 3, "y": 4 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Request {
    /// Open a fresh session and join it as the first player.
    #[serde(rename_all = "camelCase")]
    CreateGame {
        player_name: String,
        /// Board side length; the server default applies when omitted.
        board_size: Option<usize>,
    },
    /// Join an existing session by its share code.
    #[serde(rename_all = "camelCase")]
    JoinGame {
        game_id: SessionId,
        player_name: String,
    },
    /// Place a tile at `(x, y)`.
    #[serde(rename_all = "camelCase")]
    ClaimTile {
        game_id: SessionId,
        player_id: PlayerId,
        x: usize,
        y: usize,
    },
    /// Pass the turn voluntarily.
    #[serde(rename_all = "camelCase")]
    EndTurn {
        game_id: SessionId,
        player_id: PlayerId,
    },
    /// Request the exclusive lock on a cell before claiming it.
    #[serde(rename_all = "camelCase")]
    RequestLock {
        game_id: SessionId,
        player_id: PlayerId,
        x: usize,
        y: usize,
    },
    /// Give up a held cell lock.
    #[serde(rename_all = "camelCase")]
    ReleaseLock {
        game_id: SessionId,
        player_id: PlayerId,
        x: usize,
        y: usize,
    },
    /// Clock probe; answered with the server's wall-clock time.
    SyncTime,
}

/// A message sent from the server to one or more clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Reply to `createGame`: the creator's identity and the fresh board.
    #[serde(rename_all = "camelCase")]
    GameCreated {
        game_id: SessionId,
        player_id: PlayerId,
        player_color: Color,
        board_state: BoardState,
    },
    /// Reply to `joinGame` for the joining player.
    #[serde(rename_all = "camelCase")]
    GameJoined {
        game_id: SessionId,
        player_id: PlayerId,
        player_color: Color,
        board_state: BoardState,
    },
    /// Broadcast to existing members when someone joins.
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        player_id: PlayerId,
        player_name: String,
        player_color: Color,
    },
    /// Broadcast after every accepted move.
    #[serde(rename_all = "camelCase")]
    BoardUpdated {
        board_state: BoardState,
        /// Cells enclosed by the move, present only when territory changed.
        #[serde(skip_serializing_if = "Option::is_none")]
        claimed_territories: Option<Vec<Cell>>,
    },
    /// Broadcast when the session ends; standings sorted best-first.
    #[serde(rename_all = "camelCase")]
    GameOver { scores: Vec<PlayerSummary> },
    /// Reply to the requester after a lock grant or release.
    #[serde(rename_all = "camelCase")]
    LockStateUpdated {
        /// Held locks, keyed `"x,y"`.
        locks: HashMap<String, PlayerId>,
    },
    /// Reply to the requester when a lock is contended.
    #[serde(rename_all = "camelCase")]
    LockDenied { x: usize, y: usize },
    /// Broadcast when a wait-for cycle closes; the session is over.
    #[serde(rename_all = "camelCase")]
    DeadlockDetected { message: String },
    /// Broadcast when a member disconnects.
    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: PlayerId },
    /// Reply to `syncTime`.
    #[serde(rename_all = "camelCase")]
    SyncTime { server_time: u64 },
    /// Request-scoped failure reply (unknown game, full game, bad size).
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

impl ServerEvent {
    /// Encodes the event as a JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Full snapshot of one session, sent on join and after every move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardState {
    pub size: usize,
    pub tiles: Vec<Vec<Option<Color>>>,
    pub territories: Vec<Vec<Option<Color>>>,
    pub current_turn: Option<PlayerId>,
    pub players: Vec<PlayerSummary>,
}

impl BoardState {
    /// Captures the session's current state in wire shape.
    pub fn from_session(session: &GameSession) -> Self {
        Self {
            size: session.board().size(),
            tiles: session.board().tiles().to_vec(),
            territories: session.board().territories().to_vec(),
            current_turn: session.current_turn(),
            players: session.players().iter().map(|p| p.summary()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_game_request_decodes() {
        let json = r#"{"type":"createGame","payload":{"playerName":"alice","boardSize":12}}"#;
        let request: Request = serde_json::from_str(json).unwrap();
        assert_eq!(
            request,
            Request::CreateGame {
                player_name: "alice".to_string(),
                board_size: Some(12),
            }
        );
    }

    #[test]
    fn board_size_defaults_to_absent() {
        let json = r#"{"type":"createGame","payload":{"playerName":"alice"}}"#;
        let request: Request = serde_json::from_str(json).unwrap();
        assert_eq!(
            request,
            Request::CreateGame {
                player_name: "alice".to_string(),
                board_size: None,
            }
        );
    }

    #[test]
    fn sync_time_needs_no_payload() {
        let request: Request = serde_json::from_str(r#"{"type":"syncTime"}"#).unwrap();
        assert_eq!(request, Request::SyncTime);
    }

    #[test]
    fn unknown_message_types_fail_to_decode() {
        let json = r#"{"type":"teleport","payload":{}}"#;
        assert!(serde_json::from_str::<Request>(json).is_err());
    }

    #[test]
    fn claim_tile_uses_camel_case_fields() {
        let json = format!(
            r#"{{"type":"claimTile","payload":{{"gameId":"ABC123","playerId":"{}","x":3,"y":4}}}}"#,
            PlayerId::new()
        );
        let request: Request = serde_json::from_str(&json).unwrap();
        match request {
            Request::ClaimTile { game_id, x, y, .. } => {
                assert_eq!(game_id.as_str(), "ABC123");
                assert_eq!((x, y), (3, 4));
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn lock_denied_event_encodes_with_payload_envelope() {
        let event = ServerEvent::LockDenied { x: 2, y: 7 };
        let json = event.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "lockDenied");
        assert_eq!(value["payload"]["x"], 2);
        assert_eq!(value["payload"]["y"], 7);
    }

    #[test]
    fn claimed_territories_are_omitted_when_absent() {
        let session = GameSession::new(SessionId::from("ABC123"), 3);
        let event = ServerEvent::BoardUpdated {
            board_state: BoardState::from_session(&session),
            claimed_territories: None,
        };
        let json = event.to_json().unwrap();
        assert!(!json.contains("claimedTerritories"));
    }

    #[test]
    fn board_state_snapshot_matches_session() {
        let mut session = GameSession::new(SessionId::from("ABC123"), 4);
        let alice = PlayerId::new();
        session.add_player(alice, "alice", Color::Green);

        let state = BoardState::from_session(&session);
        assert_eq!(state.size, 4);
        assert_eq!(state.current_turn, Some(alice));
        assert_eq!(state.players.len(), 1);
        assert_eq!(state.players[0].name, "alice");
        assert_eq!(state.tiles[0][0], None);
    }
}
