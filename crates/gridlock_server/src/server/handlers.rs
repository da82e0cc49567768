//! Connection handling logic for WebSocket clients.
//!
//! This module contains the core connection handling logic that manages
//! the lifecycle of individual client connections, including WebSocket
//! handshaking, message processing, and cleanup.

use crate::{
    connection::{ConnectionId, ConnectionManager},
    error::ServerError,
    game::PlayerId,
    messaging::route_client_message,
    messaging::router::handle_player_departure,
    registry::SessionRegistry,
};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, trace, warn};

/// Handles a single client connection from establishment to cleanup.
///
/// # Connection Flow
///
/// 1. Perform WebSocket handshake
/// 2. Register connection with the connection manager
/// 3. Generate and assign a player ID
/// 4. Start message handling tasks (incoming and outgoing)
/// 5. Handle connection termination and session cleanup
///
/// # Message Handling
///
/// The function runs two concurrent tasks:
///
/// * **Incoming Task**: Decodes client frames and routes them to game state
/// * **Outgoing Task**: Forwards frames targeted at this connection to the
///   socket
///
/// These tasks run until the connection closes or an error occurs; the
/// first one to finish tears down the other.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection_manager: Arc<ConnectionManager>,
    registry: Arc<SessionRegistry>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed: {e}")))?;

    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let ws_sender = Arc::new(tokio::sync::Mutex::new(ws_sender));
    let connection_id = connection_manager.add_connection(addr).await;

    // Identity is connection-scoped: assigned here, echoed back to the
    // client on create/join.
    let player_id = PlayerId::new();
    connection_manager
        .set_player_id(connection_id, player_id)
        .await;
    info!("👋 Player {} connected from {}", player_id, addr);

    let mut message_receiver = connection_manager.subscribe();
    let ws_sender_incoming = ws_sender.clone();
    let ws_sender_outgoing = ws_sender.clone();

    // Incoming message task - routes frames into game state
    let incoming_task = {
        let connection_manager = connection_manager.clone();
        let registry = registry.clone();

        async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Err(e) = route_client_message(
                            &text,
                            connection_id,
                            &connection_manager,
                            &registry,
                        )
                        .await
                        {
                            warn!("❌ Message routing error: {}", e);
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("🔌 Client {} requested close", connection_id);
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        let mut ws_sender = ws_sender_incoming.lock().await;
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Err(e) => {
                        error!("WebSocket error for connection {}: {}", connection_id, e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    };

    // Outgoing message task
    let outgoing_task = {
        let ws_sender = ws_sender_outgoing;
        async move {
            while let Some((target_connection_id, message)) =
                next_outgoing(&mut message_receiver).await
            {
                if target_connection_id == connection_id {
                    // Frames are locally produced JSON; anything else is a
                    // bug upstream, not a reason to mangle the payload.
                    let message_text = match String::from_utf8(message) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(
                                "Dropping non-UTF-8 frame for connection {}: {}",
                                connection_id, e
                            );
                            continue;
                        }
                    };
                    let mut ws_sender = ws_sender.lock().await;
                    if let Err(e) = ws_sender.send(Message::Text(message_text.into())).await {
                        error!("Failed to send message: {}", e);
                        break;
                    }
                }
            }
        }
    };

    tokio::select! {
        _ = incoming_task => {},
        _ = outgoing_task => {},
    }

    // Pull the connection out of the table first so session broadcasts
    // below no longer target it.
    let session_id = connection_manager.get_session(connection_id).await;
    connection_manager.remove_connection(connection_id).await;
    info!("👋 Player {} disconnected", player_id);

    // A disconnect can race the create/join flow: the player joins the
    // session before the connection records the membership, so an unset
    // session link still has to be checked against the registry.
    let membership = match session_id {
        Some(session_id) => match registry.get(&session_id).await {
            Some(session) => Some((session_id, session)),
            None => {
                trace!("Session {} already gone at disconnect", session_id);
                None
            }
        },
        None => registry.find_session_of(player_id).await,
    };

    if let Some((session_id, session)) = membership {
        handle_player_departure(
            &connection_manager,
            &registry,
            &session_id,
            &session,
            player_id,
        )
        .await?;
    }

    Ok(())
}

/// Waits for the next outbound frame, riding out lag on the shared channel.
///
/// A lagged receiver has lost the overwritten frames but is still healthy;
/// only a closed channel ends the writer task.
pub(crate) async fn next_outgoing(
    receiver: &mut broadcast::Receiver<(ConnectionId, Vec<u8>)>,
) -> Option<(ConnectionId, Vec<u8>)> {
    loop {
        match receiver.recv().await {
            Ok(frame) => return Some(frame),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Outgoing channel lagged, {} frames skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
