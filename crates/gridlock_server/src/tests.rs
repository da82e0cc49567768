
// Include tests
#[cfg(test)]
mod tests {
    use crate::config::GameConfig;
    use crate::connection::{ConnectionId, ConnectionManager};
    use crate::game::{Color, PlayerId};
    use crate::messaging::{route_client_message, Request, ServerEvent};
    use crate::registry::{SessionId, SessionRegistry};
    use crate::*;
    use tokio::sync::broadcast;
    use tokio::time::{timeout, Duration};

    async fn connect(manager: &ConnectionManager) -> (ConnectionId, PlayerId) {
        let connection_id = manager
            .add_connection("127.0.0.1:0".parse().unwrap())
            .await;
        let player_id = PlayerId::new();
        manager.set_player_id(connection_id, player_id).await;
        (connection_id, player_id)
    }

    async fn send(
        request: &Request,
        connection_id: ConnectionId,
        manager: &ConnectionManager,
        registry: &SessionRegistry,
    ) {
        let text = serde_json::to_string(request).unwrap();
        route_client_message(&text, connection_id, manager, registry)
            .await
            .expect("routing failed");
    }

    /// Pulls the next event addressed to `target`, skipping frames for
    /// other connections.
    async fn next_event_for(
        receiver: &mut broadcast::Receiver<(ConnectionId, Vec<u8>)>,
        target: ConnectionId,
    ) -> ServerEvent {
        loop {
            let (connection_id, bytes) = timeout(Duration::from_secs(1), receiver.recv())
                .await
                .expect("timed out waiting for event")
                .expect("channel closed");
            if connection_id == target {
                return serde_json::from_slice(&bytes).expect("valid event JSON");
            }
        }
    }

    async fn expect_silence(
        receiver: &mut broadcast::Receiver<(ConnectionId, Vec<u8>)>,
    ) {
        let outcome = timeout(Duration::from_millis(100), receiver.recv()).await;
        assert!(outcome.is_err(), "expected no event, got {outcome:?}");
    }

    /// Creates a game and joins a second player, returning everything the
    /// lock and move tests need.
    async fn two_player_game(
        manager: &ConnectionManager,
        registry: &SessionRegistry,
        receiver: &mut broadcast::Receiver<(ConnectionId, Vec<u8>)>,
    ) -> (SessionId, (ConnectionId, PlayerId), (ConnectionId, PlayerId)) {
        let (conn_a, _) = connect(manager).await;
        let (conn_b, _) = connect(manager).await;

        send(
            &Request::CreateGame {
                player_name: "alice".to_string(),
                board_size: None,
            },
            conn_a,
            manager,
            registry,
        )
        .await;
        let ServerEvent::GameCreated {
            game_id,
            player_id: alice,
            ..
        } = next_event_for(receiver, conn_a).await
        else {
            panic!("expected gameCreated");
        };

        send(
            &Request::JoinGame {
                game_id: game_id.clone(),
                player_name: "bob".to_string(),
            },
            conn_b,
            manager,
            registry,
        )
        .await;
        let ServerEvent::GameJoined { player_id: bob, .. } =
            next_event_for(receiver, conn_b).await
        else {
            panic!("expected gameJoined");
        };
        // Alice hears about Bob.
        let ServerEvent::PlayerJoined { player_id, .. } =
            next_event_for(receiver, conn_a).await
        else {
            panic!("expected playerJoined");
        };
        assert_eq!(player_id, bob);

        (game_id, (conn_a, alice), (conn_b, bob))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_game_returns_fresh_board() {
        let manager = ConnectionManager::new();
        let registry = SessionRegistry::new(GameConfig::default());
        let mut receiver = manager.subscribe();

        let (conn, player) = connect(&manager).await;
        send(
            &Request::CreateGame {
                player_name: "alice".to_string(),
                board_size: Some(8),
            },
            conn,
            &manager,
            &registry,
        )
        .await;

        match next_event_for(&mut receiver, conn).await {
            ServerEvent::GameCreated {
                game_id,
                player_id,
                player_color,
                board_state,
            } => {
                assert_eq!(game_id.as_str().len(), 6);
                assert_eq!(player_id, player);
                assert_eq!(player_color, Color::Green);
                assert_eq!(board_state.size, 8);
                assert_eq!(board_state.current_turn, Some(player));
                assert_eq!(board_state.players.len(), 1);
                assert!(registry.get(&game_id).await.is_some());
            }
            other => panic!("expected gameCreated, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_join_unknown_game_is_an_error_reply() {
        let manager = ConnectionManager::new();
        let registry = SessionRegistry::new(GameConfig::default());
        let mut receiver = manager.subscribe();

        let (conn, _) = connect(&manager).await;
        send(
            &Request::JoinGame {
                game_id: SessionId::from("NOSUCH"),
                player_name: "bob".to_string(),
            },
            conn,
            &manager,
            &registry,
        )
        .await;

        match next_event_for(&mut receiver, conn).await {
            ServerEvent::Error { message } => assert_eq!(message, "Game not found"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sixth_player_is_turned_away() {
        let manager = ConnectionManager::new();
        let registry = SessionRegistry::new(GameConfig::default());
        let mut receiver = manager.subscribe();

        let (creator, _) = connect(&manager).await;
        send(
            &Request::CreateGame {
                player_name: "p0".to_string(),
                board_size: None,
            },
            creator,
            &manager,
            &registry,
        )
        .await;
        let ServerEvent::GameCreated { game_id, .. } = next_event_for(&mut receiver, creator).await
        else {
            panic!("expected gameCreated");
        };

        for i in 1..5 {
            let (conn, _) = connect(&manager).await;
            send(
                &Request::JoinGame {
                    game_id: game_id.clone(),
                    player_name: format!("p{i}"),
                },
                conn,
                &manager,
                &registry,
            )
            .await;
            assert!(matches!(
                next_event_for(&mut receiver, conn).await,
                ServerEvent::GameJoined { .. }
            ));
        }

        let (conn, _) = connect(&manager).await;
        send(
            &Request::JoinGame {
                game_id,
                player_name: "p5".to_string(),
            },
            conn,
            &manager,
            &registry,
        )
        .await;
        match next_event_for(&mut receiver, conn).await {
            ServerEvent::Error { message } => assert_eq!(message, "Game is full"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_board_size_is_an_error_reply() {
        let manager = ConnectionManager::new();
        let registry = SessionRegistry::new(GameConfig::default());
        let mut receiver = manager.subscribe();

        let (conn, _) = connect(&manager).await;
        send(
            &Request::CreateGame {
                player_name: "alice".to_string(),
                board_size: Some(100),
            },
            conn,
            &manager,
            &registry,
        )
        .await;

        assert!(matches!(
            next_event_for(&mut receiver, conn).await,
            ServerEvent::Error { .. }
        ));
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_claim_tile_broadcasts_to_the_whole_session() {
        let manager = ConnectionManager::new();
        let registry = SessionRegistry::new(GameConfig::default());
        let mut receiver = manager.subscribe();

        let (game_id, (conn_a, alice), (conn_b, bob)) =
            two_player_game(&manager, &registry, &mut receiver).await;

        send(
            &Request::ClaimTile {
                game_id,
                player_id: alice,
                x: 0,
                y: 0,
            },
            conn_a,
            &manager,
            &registry,
        )
        .await;

        // Both members get the same update, in whichever order the
        // broadcast visited them.
        let mut recipients = Vec::new();
        for _ in 0..2 {
            let (conn, bytes) = timeout(Duration::from_secs(1), receiver.recv())
                .await
                .expect("timed out waiting for event")
                .expect("channel closed");
            recipients.push(conn);
            match serde_json::from_slice(&bytes).expect("valid event JSON") {
                ServerEvent::BoardUpdated {
                    board_state,
                    claimed_territories,
                } => {
                    assert_eq!(board_state.tiles[0][0], Some(Color::Green));
                    assert_eq!(board_state.current_turn, Some(bob));
                    assert!(claimed_territories.is_none());
                }
                other => panic!("expected boardUpdated, got {other:?}"),
            }
        }
        recipients.sort_unstable();
        let mut expected = vec![conn_a, conn_b];
        expected.sort_unstable();
        assert_eq!(recipients, expected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_out_of_turn_claims_are_dropped() {
        let manager = ConnectionManager::new();
        let registry = SessionRegistry::new(GameConfig::default());
        let mut receiver = manager.subscribe();

        let (game_id, _, (conn_b, bob)) =
            two_player_game(&manager, &registry, &mut receiver).await;

        // It is Alice's turn; Bob's claim produces no reply and no
        // broadcast.
        send(
            &Request::ClaimTile {
                game_id,
                player_id: bob,
                x: 0,
                y: 0,
            },
            conn_b,
            &manager,
            &registry,
        )
        .await;
        expect_silence(&mut receiver).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_end_turn_passes_without_a_move() {
        let manager = ConnectionManager::new();
        let registry = SessionRegistry::new(GameConfig::default());
        let mut receiver = manager.subscribe();

        let (game_id, (conn_a, alice), (_, bob)) =
            two_player_game(&manager, &registry, &mut receiver).await;

        send(
            &Request::EndTurn {
                game_id,
                player_id: alice,
            },
            conn_a,
            &manager,
            &registry,
        )
        .await;

        match next_event_for(&mut receiver, conn_a).await {
            ServerEvent::BoardUpdated { board_state, .. } => {
                assert_eq!(board_state.current_turn, Some(bob));
            }
            other => panic!("expected boardUpdated, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_lock_grant_denial_and_deadlock() {
        let manager = ConnectionManager::new();
        let registry = SessionRegistry::new(GameConfig::default());
        let mut receiver = manager.subscribe();

        let (game_id, (conn_a, alice), (conn_b, bob)) =
            two_player_game(&manager, &registry, &mut receiver).await;

        // Alice takes (0,0). The table goes back to her alone; Bob hears
        // nothing about it.
        send(
            &Request::RequestLock {
                game_id: game_id.clone(),
                player_id: alice,
                x: 0,
                y: 0,
            },
            conn_a,
            &manager,
            &registry,
        )
        .await;
        match next_event_for(&mut receiver, conn_a).await {
            ServerEvent::LockStateUpdated { locks } => {
                assert_eq!(locks.get("0,0"), Some(&alice));
            }
            other => panic!("expected lockStateUpdated, got {other:?}"),
        }
        expect_silence(&mut receiver).await;

        // Bob takes (1,1).
        send(
            &Request::RequestLock {
                game_id: game_id.clone(),
                player_id: bob,
                x: 1,
                y: 1,
            },
            conn_b,
            &manager,
            &registry,
        )
        .await;
        match next_event_for(&mut receiver, conn_b).await {
            ServerEvent::LockStateUpdated { locks } => {
                assert_eq!(locks.len(), 2);
            }
            other => panic!("expected lockStateUpdated, got {other:?}"),
        }
        expect_silence(&mut receiver).await;

        // Alice wants Bob's cell: denied, no deadlock yet.
        send(
            &Request::RequestLock {
                game_id: game_id.clone(),
                player_id: alice,
                x: 1,
                y: 1,
            },
            conn_a,
            &manager,
            &registry,
        )
        .await;
        match next_event_for(&mut receiver, conn_a).await {
            ServerEvent::LockDenied { x, y } => assert_eq!((x, y), (1, 1)),
            other => panic!("expected lockDenied, got {other:?}"),
        }

        // Bob wants Alice's cell: the wait-for cycle closes.
        send(
            &Request::RequestLock {
                game_id: game_id.clone(),
                player_id: bob,
                x: 0,
                y: 0,
            },
            conn_b,
            &manager,
            &registry,
        )
        .await;
        assert!(matches!(
            next_event_for(&mut receiver, conn_b).await,
            ServerEvent::LockDenied { .. }
        ));
        assert!(matches!(
            next_event_for(&mut receiver, conn_a).await,
            ServerEvent::DeadlockDetected { .. }
        ));

        // The session is torn down.
        assert!(registry.get(&game_id).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_release_lock_replies_with_updated_table() {
        let manager = ConnectionManager::new();
        let registry = SessionRegistry::new(GameConfig::default());
        let mut receiver = manager.subscribe();

        let (game_id, (conn_a, alice), _) =
            two_player_game(&manager, &registry, &mut receiver).await;

        send(
            &Request::RequestLock {
                game_id: game_id.clone(),
                player_id: alice,
                x: 3,
                y: 3,
            },
            conn_a,
            &manager,
            &registry,
        )
        .await;
        assert!(matches!(
            next_event_for(&mut receiver, conn_a).await,
            ServerEvent::LockStateUpdated { .. }
        ));
        expect_silence(&mut receiver).await;

        send(
            &Request::ReleaseLock {
                game_id,
                player_id: alice,
                x: 3,
                y: 3,
            },
            conn_a,
            &manager,
            &registry,
        )
        .await;
        // The emptied table goes back to the releaser only.
        match next_event_for(&mut receiver, conn_a).await {
            ServerEvent::LockStateUpdated { locks } => assert!(locks.is_empty()),
            other => panic!("expected lockStateUpdated, got {other:?}"),
        }
        expect_silence(&mut receiver).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_departure_leaves_a_sole_survivor_winning() {
        let manager = ConnectionManager::new();
        let registry = SessionRegistry::new(GameConfig::default());
        let mut receiver = manager.subscribe();

        let (game_id, (conn_a, _), (_, bob)) =
            two_player_game(&manager, &registry, &mut receiver).await;

        let session = registry.get(&game_id).await.unwrap();
        messaging::router::handle_player_departure(
            &manager,
            &registry,
            &game_id,
            &session,
            bob,
        )
        .await
        .unwrap();

        match next_event_for(&mut receiver, conn_a).await {
            ServerEvent::PlayerLeft { player_id } => assert_eq!(player_id, bob),
            other => panic!("expected playerLeft, got {other:?}"),
        }
        match next_event_for(&mut receiver, conn_a).await {
            ServerEvent::GameOver { scores } => assert_eq!(scores.len(), 1),
            other => panic!("expected gameOver, got {other:?}"),
        }
        assert!(registry.get(&game_id).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sync_time_replies_with_server_clock() {
        let manager = ConnectionManager::new();
        let registry = SessionRegistry::new(GameConfig::default());
        let mut receiver = manager.subscribe();

        let (conn, _) = connect(&manager).await;
        send(&Request::SyncTime, conn, &manager, &registry).await;

        match next_event_for(&mut receiver, conn).await {
            ServerEvent::SyncTime { server_time } => assert!(server_time > 0),
            other => panic!("expected syncTime, got {other:?}"),
        }
    }

    /// Serves exactly one WebSocket connection on an ephemeral port.
    fn serve_one_connection(
        manager: std::sync::Arc<ConnectionManager>,
        registry: std::sync::Arc<SessionRegistry>,
        listener: tokio::net::TcpListener,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            crate::server::handlers::handle_connection(stream, peer, manager, registry)
                .await
                .unwrap();
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_disconnect_before_session_link_still_cleans_up() {
        let manager = std::sync::Arc::new(ConnectionManager::new());
        let registry = std::sync::Arc::new(SessionRegistry::new(GameConfig::default()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = serve_one_connection(manager.clone(), registry.clone(), listener);

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();

        // Wait for the handler to register the connection and its identity.
        let player_id = {
            let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
            loop {
                if let Some(player_id) = manager.get_player_id(1).await {
                    break player_id;
                }
                assert!(
                    tokio::time::Instant::now() < deadline,
                    "connection never registered"
                );
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };

        // The player has joined a session, but the connection never recorded
        // the membership - the window between add_player and set_session.
        let (game_id, session) = registry.create_session(None).await.unwrap();
        {
            let mut game = session.lock().await;
            let color = game.next_free_color().unwrap();
            game.add_player(player_id, "alice", color);
        }

        socket.close(None).await.unwrap();
        server.await.unwrap();

        // The departure was resolved through the registry scan; the emptied
        // session is gone, not leaked.
        assert!(registry.get(&game_id).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_frames_cross_the_socket_utf8_intact() {
        use futures_util::{SinkExt, StreamExt};
        use tokio_tungstenite::tungstenite::Message;

        let manager = std::sync::Arc::new(ConnectionManager::new());
        let registry = std::sync::Arc::new(SessionRegistry::new(GameConfig::default()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = serve_one_connection(manager.clone(), registry.clone(), listener);

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();
        let request = serde_json::to_string(&Request::CreateGame {
            player_name: "héloïse".to_string(),
            board_size: Some(4),
        })
        .unwrap();
        socket.send(Message::Text(request.into())).await.unwrap();

        let frame = timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .unwrap();
        let event: ServerEvent = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        match event {
            ServerEvent::GameCreated { board_state, .. } => {
                assert_eq!(board_state.players[0].name, "héloïse");
            }
            other => panic!("expected gameCreated, got {other:?}"),
        }

        socket.close(None).await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_writer_rides_out_channel_lag() {
        let (sender, mut receiver) = broadcast::channel::<(ConnectionId, Vec<u8>)>(2);
        for i in 0..5usize {
            sender.send((i, vec![i as u8])).unwrap();
        }

        // The first three frames were overwritten; delivery resumes at the
        // oldest retained frame instead of ending the stream.
        let (first, _) = server::handlers::next_outgoing(&mut receiver).await.unwrap();
        assert_eq!(first, 3);
        let (second, _) = server::handlers::next_outgoing(&mut receiver).await.unwrap();
        assert_eq!(second, 4);

        drop(sender);
        assert!(server::handlers::next_outgoing(&mut receiver).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_server_creation_with_defaults() {
        let server = create_server();
        assert_eq!(server.registry().session_count().await, 0);
        assert_eq!(server.connection_manager().connection_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.connection_timeout, 60);
        assert_eq!(config.game.default_board_size, 10);
        assert_eq!(config.game.max_board_size, 32);
        assert_eq!(config.game.max_players_per_session, 5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_server_creation_with_custom_config() {
        let config = ServerConfig {
            bind_address: "127.0.0.1:9999".parse().unwrap(),
            max_connections: 2000,
            ..Default::default()
        };
        let server = create_server_with_config(config);

        let (_, session) = server.registry().create_session(Some(4)).await.unwrap();
        assert_eq!(session.lock().await.board().size(), 4);
    }
}
