//! Message routing logic for dispatching client requests to game sessions.
//!
//! This module decodes incoming text frames, resolves the target session,
//! and applies the requested operation under the session's lock. Replies go
//! back to the requesting connection; state changes fan out to every member
//! of the session.

use crate::connection::{ConnectionId, ConnectionManager};
use crate::error::ServerError;
use crate::game::{Cell, LockOutcome, PlayerId};
use crate::messaging::types::{BoardState, Request, ServerEvent};
use crate::registry::{SessionId, SessionRegistry, SharedSession};
use crate::utils::current_timestamp_ms;
use tracing::{debug, info, warn};

const DEADLOCK_MESSAGE: &str = "💥 Deadlock detected! Game Stopped.";

/// Routes a raw client frame to the game state it targets.
///
/// # Arguments
///
/// * `text` - The raw message text from the client (expected to be JSON)
/// * `connection_id` - The unique identifier for the client connection
/// * `connection_manager` - Manager for player lookup and frame delivery
/// * `registry` - The live-session registry
///
/// # Returns
///
/// `Ok(())` once the request was handled (including request-scoped failures
/// answered with an `error` event), or a `ServerError` when the frame could
/// not be decoded or the connection has no player identity.
///
/// # Error policy
///
/// Recoverable, request-scoped failures (unknown game, full game, bad board
/// size) are answered with an `error` event and do not fail routing. Invalid
/// moves and out-of-turn actions are logged at debug and dropped; clients
/// resynchronize from the next broadcast.
pub async fn route_client_message(
    text: &str,
    connection_id: ConnectionId,
    connection_manager: &ConnectionManager,
    registry: &SessionRegistry,
) -> Result<(), ServerError> {
    let request: Request = serde_json::from_str(text)
        .map_err(|e| ServerError::Network(format!("Invalid JSON: {e}")))?;

    match request {
        Request::CreateGame {
            player_name,
            board_size,
        } => {
            handle_create_game(
                connection_id,
                connection_manager,
                registry,
                &player_name,
                board_size,
            )
            .await
        }
        Request::JoinGame {
            game_id,
            player_name,
        } => {
            handle_join_game(
                connection_id,
                connection_manager,
                registry,
                &game_id,
                &player_name,
            )
            .await
        }
        Request::ClaimTile {
            game_id,
            player_id,
            x,
            y,
        } => {
            handle_claim_tile(
                connection_manager,
                registry,
                &game_id,
                player_id,
                x,
                y,
            )
            .await
        }
        Request::EndTurn { game_id, player_id } => {
            handle_end_turn(connection_manager, registry, &game_id, player_id).await
        }
        Request::RequestLock {
            game_id,
            player_id,
            x,
            y,
        } => {
            handle_request_lock(
                connection_id,
                connection_manager,
                registry,
                &game_id,
                player_id,
                x,
                y,
            )
            .await
        }
        Request::ReleaseLock {
            game_id,
            player_id,
            x,
            y,
        } => {
            handle_release_lock(
                connection_id,
                connection_manager,
                registry,
                &game_id,
                player_id,
                x,
                y,
            )
            .await
        }
        Request::SyncTime => {
            let event = ServerEvent::SyncTime {
                server_time: current_timestamp_ms(),
            };
            reply(connection_manager, connection_id, &event).await
        }
    }
}

async fn handle_create_game(
    connection_id: ConnectionId,
    connection_manager: &ConnectionManager,
    registry: &SessionRegistry,
    player_name: &str,
    board_size: Option<usize>,
) -> Result<(), ServerError> {
    let player_id = player_for(connection_manager, connection_id).await?;

    let (game_id, session) = match registry.create_session(board_size).await {
        Ok(created) => created,
        Err(error) => {
            let (ServerError::Network(message) | ServerError::Internal(message)) = error;
            return reply_error(connection_manager, connection_id, message).await;
        }
    };

    let event = {
        let mut game = session.lock().await;
        // A fresh session always has palette capacity for its creator.
        let color = match game.next_free_color() {
            Some(color) => color,
            None => {
                return Err(ServerError::Internal(
                    "Fresh session has no free color".to_string(),
                ))
            }
        };
        game.add_player(player_id, player_name, color);
        ServerEvent::GameCreated {
            game_id: game_id.clone(),
            player_id,
            player_color: color,
            board_state: BoardState::from_session(&game),
        }
    };

    connection_manager
        .set_session(connection_id, game_id.clone())
        .await;
    info!("🎮 Player {} ({}) created game {}", player_id, player_name, game_id);
    reply(connection_manager, connection_id, &event).await
}

async fn handle_join_game(
    connection_id: ConnectionId,
    connection_manager: &ConnectionManager,
    registry: &SessionRegistry,
    game_id: &SessionId,
    player_name: &str,
) -> Result<(), ServerError> {
    let player_id = player_for(connection_manager, connection_id).await?;

    let Some(session) = registry.get(game_id).await else {
        return reply_error(connection_manager, connection_id, "Game not found".to_string()).await;
    };

    let (joined, announce) = {
        let mut game = session.lock().await;
        if game.player_count() >= registry.config().max_players_per_session {
            drop(game);
            return reply_error(connection_manager, connection_id, "Game is full".to_string())
                .await;
        }
        let Some(color) = game.next_free_color() else {
            drop(game);
            return reply_error(connection_manager, connection_id, "Game is full".to_string())
                .await;
        };
        game.add_player(player_id, player_name, color);
        (
            ServerEvent::GameJoined {
                game_id: game_id.clone(),
                player_id,
                player_color: color,
                board_state: BoardState::from_session(&game),
            },
            ServerEvent::PlayerJoined {
                player_id,
                player_name: player_name.to_string(),
                player_color: color,
            },
        )
    };

    connection_manager
        .set_session(connection_id, game_id.clone())
        .await;
    info!("🎮 Player {} ({}) joined game {}", player_id, player_name, game_id);

    reply(connection_manager, connection_id, &joined).await?;
    broadcast(
        connection_manager,
        game_id,
        &announce,
        Some(connection_id),
    )
    .await
}

async fn handle_claim_tile(
    connection_manager: &ConnectionManager,
    registry: &SessionRegistry,
    game_id: &SessionId,
    player_id: PlayerId,
    x: usize,
    y: usize,
) -> Result<(), ServerError> {
    let Some(session) = registry.get(game_id).await else {
        debug!("🚫 claimTile for unknown game {}", game_id);
        return Ok(());
    };

    let (update, game_over) = {
        let mut game = session.lock().await;
        match game.place_tile(player_id, x, y) {
            Ok(outcome) => {
                let claimed = if outcome.claimed_territories.is_empty() {
                    None
                } else {
                    Some(outcome.claimed_territories)
                };
                let update = ServerEvent::BoardUpdated {
                    board_state: BoardState::from_session(&game),
                    claimed_territories: claimed,
                };
                let game_over = outcome
                    .game_over
                    .then(|| ServerEvent::GameOver { scores: game.scores() });
                (update, game_over)
            }
            Err(rejection) => {
                debug!(
                    "🚫 Move ({}, {}) by {} in game {} rejected: {}",
                    x, y, player_id, game_id, rejection
                );
                return Ok(());
            }
        }
    };

    broadcast(connection_manager, game_id, &update, None).await?;

    if let Some(game_over) = game_over {
        info!("🏁 Game {} over (board full)", game_id);
        broadcast(connection_manager, game_id, &game_over, None).await?;
        registry.remove(game_id).await;
    }

    Ok(())
}

async fn handle_end_turn(
    connection_manager: &ConnectionManager,
    registry: &SessionRegistry,
    game_id: &SessionId,
    player_id: PlayerId,
) -> Result<(), ServerError> {
    let Some(session) = registry.get(game_id).await else {
        debug!("🚫 endTurn for unknown game {}", game_id);
        return Ok(());
    };

    let update = {
        let mut game = session.lock().await;
        if !game.end_turn(player_id) {
            debug!("🚫 endTurn by {} in game {} ignored", player_id, game_id);
            return Ok(());
        }
        ServerEvent::BoardUpdated {
            board_state: BoardState::from_session(&game),
            claimed_territories: None,
        }
    };

    broadcast(connection_manager, game_id, &update, None).await
}

async fn handle_request_lock(
    connection_id: ConnectionId,
    connection_manager: &ConnectionManager,
    registry: &SessionRegistry,
    game_id: &SessionId,
    player_id: PlayerId,
    x: usize,
    y: usize,
) -> Result<(), ServerError> {
    let Some(session) = registry.get(game_id).await else {
        debug!("🚫 requestLock for unknown game {}", game_id);
        return Ok(());
    };

    // Lock state is requester-scoped: the grant or denial goes back to the
    // requesting connection only. Only a deadlock is everyone's business.
    let (denied_deadlock, event) = {
        let mut game = session.lock().await;
        match game.request_lock(player_id, Cell::new(x, y)) {
            LockOutcome::Granted => (
                None,
                ServerEvent::LockStateUpdated {
                    locks: game.locks().snapshot(),
                },
            ),
            LockOutcome::Denied { deadlock } => {
                (Some(deadlock), ServerEvent::LockDenied { x, y })
            }
        }
    };

    reply(connection_manager, connection_id, &event).await?;

    if denied_deadlock == Some(true) {
        warn!("💥 Deadlock in game {}; tearing the session down", game_id);
        let event = ServerEvent::DeadlockDetected {
            message: DEADLOCK_MESSAGE.to_string(),
        };
        broadcast(connection_manager, game_id, &event, None).await?;
        registry.remove(game_id).await;
    }
    Ok(())
}

async fn handle_release_lock(
    connection_id: ConnectionId,
    connection_manager: &ConnectionManager,
    registry: &SessionRegistry,
    game_id: &SessionId,
    player_id: PlayerId,
    x: usize,
    y: usize,
) -> Result<(), ServerError> {
    let Some(session) = registry.get(game_id).await else {
        debug!("🚫 releaseLock for unknown game {}", game_id);
        return Ok(());
    };

    let update = {
        let mut game = session.lock().await;
        if !game.release_lock(player_id, Cell::new(x, y)) {
            return Ok(());
        }
        ServerEvent::LockStateUpdated {
            locks: game.locks().snapshot(),
        }
    };

    reply(connection_manager, connection_id, &update).await
}

/// Announces a departure to the remaining members and tears down sessions
/// that can no longer continue.
///
/// Called by the connection handler after it removes the player from their
/// session. A session whose last member left is destroyed outright; a sole
/// survivor wins by forfeit and the session is destroyed after the final
/// standings go out.
pub async fn handle_player_departure(
    connection_manager: &ConnectionManager,
    registry: &SessionRegistry,
    game_id: &SessionId,
    session: &SharedSession,
    player_id: PlayerId,
) -> Result<(), ServerError> {
    let (remaining, game_over) = {
        let mut game = session.lock().await;
        game.remove_player(player_id);
        let remaining = game.player_count();
        let game_over = (remaining == 1)
            .then(|| ServerEvent::GameOver { scores: game.scores() });
        (remaining, game_over)
    };

    let left = ServerEvent::PlayerLeft { player_id };
    broadcast(connection_manager, game_id, &left, None).await?;

    match (remaining, game_over) {
        (0, _) => {
            registry.remove(game_id).await;
        }
        (_, Some(game_over)) => {
            info!("🏁 Game {} over (sole survivor)", game_id);
            broadcast(connection_manager, game_id, &game_over, None).await?;
            registry.remove(game_id).await;
        }
        _ => {}
    }

    Ok(())
}

async fn player_for(
    connection_manager: &ConnectionManager,
    connection_id: ConnectionId,
) -> Result<PlayerId, ServerError> {
    connection_manager
        .get_player_id(connection_id)
        .await
        .ok_or_else(|| ServerError::Internal("Player not found".to_string()))
}

async fn reply(
    connection_manager: &ConnectionManager,
    connection_id: ConnectionId,
    event: &ServerEvent,
) -> Result<(), ServerError> {
    let json = event
        .to_json()
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    connection_manager
        .send_to_connection(connection_id, json.into_bytes())
        .await;
    Ok(())
}

async fn reply_error(
    connection_manager: &ConnectionManager,
    connection_id: ConnectionId,
    message: String,
) -> Result<(), ServerError> {
    debug!("⚠️ Request failed for connection {}: {}", connection_id, message);
    reply(
        connection_manager,
        connection_id,
        &ServerEvent::Error { message },
    )
    .await
}

async fn broadcast(
    connection_manager: &ConnectionManager,
    game_id: &SessionId,
    event: &ServerEvent,
    skip: Option<ConnectionId>,
) -> Result<(), ServerError> {
    let json = event
        .to_json()
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    connection_manager
        .broadcast_to_session(game_id, json.into_bytes(), skip)
        .await;
    Ok(())
}
