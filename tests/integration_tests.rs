//! Integration tests for the tic-tac-toe session server
//!
//! These tests validate cross-component interactions: the JSON wire format,
//! complete sessions driven through the session core, and real WebSocket
//! traffic against a bound server.

use futures_util::{SinkExt, StreamExt};
use server::{Server, ServerConfig, SessionCore};
use shared::{ClientMessage, GameStatus, MovePayload, ServerMessage, Symbol, Winner};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

/// WIRE FORMAT TESTS
mod protocol_tests {
    use super::*;
    use serde_json::{json, Value};

    /// Tests that a raw browser-style frame decodes into a move
    #[test]
    fn decode_browser_move_frame() {
        let game_id = uuid::Uuid::new_v4();
        let frame = json!({
            "type": "make_move",
            "data": { "gameId": game_id, "position": 4 }
        })
        .to_string();

        let message = ClientMessage::decode(&frame).unwrap();
        assert_eq!(
            message,
            Some(ClientMessage::MakeMove(MovePayload {
                game_id,
                position: 4.0
            }))
        );
    }

    /// Tests the exact JSON shape of a game update as seen by a browser
    #[test]
    fn game_update_wire_shape() {
        let game_id = uuid::Uuid::new_v4();
        let mut board = [None; shared::BOARD_CELLS];
        board[0] = Some(Symbol::X);
        let view = shared::GameView {
            game_id,
            board,
            current_turn: Symbol::O,
            status: GameStatus::Playing,
            winner: None,
            my_symbol: Some(Symbol::X),
            opponent_name: "Bob".to_string(),
            is_my_turn: false,
        };

        let encoded = ServerMessage::GameUpdate(view).encode().unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(value["type"], "game_update");
        assert_eq!(value["gameId"], game_id.to_string());
        assert_eq!(value["data"]["board"][0], "X");
        assert_eq!(value["data"]["board"][1], Value::Null);
        assert_eq!(value["data"]["currentTurn"], "O");
        assert_eq!(value["data"]["status"], "playing");
        assert_eq!(value["data"]["isMyTurn"], false);
        assert_eq!(value["data"]["opponentName"], "Bob");
    }

    /// Tests that frames of unknown type are skipped rather than rejected
    #[test]
    fn unknown_frames_are_ignored() {
        let frame = json!({ "type": "chat", "data": "hi" }).to_string();
        assert_eq!(ClientMessage::decode(&frame).unwrap(), None);
    }
}

/// SESSION CORE TESTS
mod session_tests {
    use super::*;

    struct Player {
        connection_id: u64,
        player_id: uuid::Uuid,
        rx: mpsc::Receiver<ServerMessage>,
    }

    impl Player {
        async fn connect(core: &SessionCore, name: &str) -> Self {
            let (tx, rx) = mpsc::channel(64);
            let (connection_id, player_id) = core.connect(Some(name), tx).await;
            Player {
                connection_id,
                player_id,
                rx,
            }
        }

        /// Waits for the next message matching `pred`, skipping the rest
        async fn expect<F>(&mut self, mut pred: F) -> ServerMessage
        where
            F: FnMut(&ServerMessage) -> bool,
        {
            loop {
                let message = timeout(WAIT, self.rx.recv())
                    .await
                    .expect("timed out waiting for message")
                    .expect("channel closed");
                if pred(&message) {
                    return message;
                }
            }
        }

        async fn expect_view(&mut self) -> shared::GameView {
            match self
                .expect(|m| matches!(m, ServerMessage::GameFound(_) | ServerMessage::GameUpdate(_)))
                .await
            {
                ServerMessage::GameFound(view) | ServerMessage::GameUpdate(view) => view,
                _ => unreachable!(),
            }
        }
    }

    fn mv(game_id: uuid::Uuid, position: u8) -> ClientMessage {
        ClientMessage::MakeMove(MovePayload {
            game_id,
            position: position.into(),
        })
    }

    /// Tests the full lifecycle: queue, match, reject intruder, win, settle
    #[tokio::test]
    async fn complete_game_lifecycle() {
        let core = SessionCore::start(&ServerConfig::default());
        let mut alice = Player::connect(&core, "Alice").await;
        let mut bob = Player::connect(&core, "Bob").await;
        let mut carol = Player::connect(&core, "Carol").await;

        core.handle_message(alice.connection_id, ClientMessage::JoinQueue).await;
        core.handle_message(bob.connection_id, ClientMessage::JoinQueue).await;

        let view = alice.expect_view().await;
        assert_eq!(view.my_symbol, Some(Symbol::X));
        let game_id = view.game_id;
        assert_eq!(bob.expect_view().await.my_symbol, Some(Symbol::O));

        // A third player cannot move in someone else's game.
        core.handle_message(carol.connection_id, mv(game_id, 0)).await;
        assert_eq!(
            carol.expect(|m| matches!(m, ServerMessage::Error { .. })).await,
            ServerMessage::error("player not in this game")
        );

        for (connection_id, position) in [
            (alice.connection_id, 0),
            (bob.connection_id, 3),
            (alice.connection_id, 1),
            (bob.connection_id, 4),
            (alice.connection_id, 2),
        ] {
            core.handle_message(connection_id, mv(game_id, position)).await;
        }

        let mut last = alice.expect_view().await;
        while last.status != GameStatus::Finished {
            last = alice.expect_view().await;
        }
        assert_eq!(last.winner, Some(Winner::X));

        let alice_record = core.player(alice.player_id).await.unwrap();
        let bob_record = core.player(bob.player_id).await.unwrap();
        assert_eq!(alice_record.rating, 1016);
        assert_eq!(bob_record.rating, 984);
        assert_eq!(alice_record.wins, 1);
        assert_eq!(bob_record.losses, 1);

        // Everyone online, including bystanders, sees the new leaderboard.
        match carol
            .expect(|m| matches!(m, ServerMessage::Leaderboard(entries) if !entries.is_empty()))
            .await
        {
            ServerMessage::Leaderboard(entries) => {
                assert_eq!(entries[0].id, alice.player_id);
                assert_eq!(entries[1].id, bob.player_id);
            }
            _ => unreachable!(),
        }

        // Moves after the end are rejected.
        core.handle_message(bob.connection_id, mv(game_id, 8)).await;
        assert_eq!(
            bob.expect(|m| matches!(m, ServerMessage::Error { .. })).await,
            ServerMessage::error("game is not in playing state")
        );
    }

    /// Tests that a draw between equal ratings changes only the draw tally
    #[tokio::test]
    async fn draw_between_equals_keeps_ratings() {
        let core = SessionCore::start(&ServerConfig::default());
        let mut x = Player::connect(&core, "X").await;
        let mut o = Player::connect(&core, "O").await;
        core.handle_message(x.connection_id, ClientMessage::JoinQueue).await;
        core.handle_message(o.connection_id, ClientMessage::JoinQueue).await;
        let game_id = x.expect_view().await.game_id;

        // X O X / X O O / O X X
        let moves = [
            (x.connection_id, 0),
            (o.connection_id, 1),
            (x.connection_id, 2),
            (o.connection_id, 4),
            (x.connection_id, 3),
            (o.connection_id, 5),
            (x.connection_id, 7),
            (o.connection_id, 6),
            (x.connection_id, 8),
        ];
        for (connection_id, position) in moves {
            core.handle_message(connection_id, mv(game_id, position)).await;
        }

        let game = core.game(game_id).await.unwrap();
        assert_eq!(game.winner, Some(Winner::Draw));

        for player_id in [x.player_id, o.player_id] {
            let record = core.player(player_id).await.unwrap();
            assert_eq!(record.rating, shared::INITIAL_RATING);
            assert_eq!(record.draws, 1);
        }
        let _ = o.expect_view().await;
    }

    /// Tests that players can queue again after a game and get a new match
    #[tokio::test]
    async fn rematch_after_game() {
        let core = SessionCore::start(&ServerConfig::default());
        let mut a = Player::connect(&core, "A").await;
        let mut b = Player::connect(&core, "B").await;

        core.handle_message(a.connection_id, ClientMessage::JoinQueue).await;
        core.handle_message(b.connection_id, ClientMessage::JoinQueue).await;
        let first = a.expect_view().await.game_id;
        assert_eq!(b.expect_view().await.game_id, first);

        for (connection_id, position) in [
            (a.connection_id, 0),
            (b.connection_id, 3),
            (a.connection_id, 1),
            (b.connection_id, 4),
            (a.connection_id, 2),
        ] {
            core.handle_message(connection_id, mv(first, position)).await;
        }

        core.handle_message(b.connection_id, ClientMessage::JoinQueue).await;
        core.handle_message(a.connection_id, ClientMessage::JoinQueue).await;

        let second = b
            .expect(|m| matches!(m, ServerMessage::GameFound(_)))
            .await;
        match second {
            ServerMessage::GameFound(view) => {
                assert_ne!(view.game_id, first);
                // B queued first this time, so B plays X.
                assert_eq!(view.my_symbol, Some(Symbol::X));
            }
            _ => unreachable!(),
        }
    }

    /// Tests that a player who leaves while queued is never matched
    #[tokio::test]
    async fn disconnect_purges_queue() {
        let core = SessionCore::start(&ServerConfig::default());
        let gone = Player::connect(&core, "Gone").await;
        let mut a = Player::connect(&core, "A").await;
        let mut b = Player::connect(&core, "B").await;

        core.handle_message(gone.connection_id, ClientMessage::JoinQueue).await;
        core.disconnect(gone.connection_id).await;
        assert!(core.queued_players().await.is_empty());

        core.handle_message(a.connection_id, ClientMessage::JoinQueue).await;
        core.handle_message(b.connection_id, ClientMessage::JoinQueue).await;

        let view = a.expect_view().await;
        assert_eq!(view.opponent_name, "B");
        assert_eq!(view.my_symbol, Some(Symbol::X));
        assert_eq!(b.expect_view().await.opponent_name, "A");
    }

    /// Tests that a disconnected player's record survives on the leaderboard
    #[tokio::test]
    async fn leaderboard_survives_disconnect() {
        let core = SessionCore::start(&ServerConfig::default());
        let mut a = Player::connect(&core, "A").await;
        let b = Player::connect(&core, "B").await;
        core.handle_message(a.connection_id, ClientMessage::JoinQueue).await;
        core.handle_message(b.connection_id, ClientMessage::JoinQueue).await;
        let game_id = a.expect_view().await.game_id;

        for (connection_id, position) in [
            (a.connection_id, 0),
            (b.connection_id, 3),
            (a.connection_id, 1),
            (b.connection_id, 4),
            (a.connection_id, 2),
        ] {
            core.handle_message(connection_id, mv(game_id, position)).await;
        }

        core.disconnect(a.connection_id).await;
        core.disconnect(b.connection_id).await;
        assert_eq!(core.connection_count().await, 0);

        let leaderboard = core.leaderboard().await;
        assert_eq!(leaderboard.len(), 2);
        assert_eq!(leaderboard[0].id, a.player_id);
    }
}

/// REAL NETWORK TESTS
mod websocket_tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn start_server() -> std::net::SocketAddr {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..ServerConfig::default()
        };
        let server = Server::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        addr
    }

    async fn open(addr: std::net::SocketAddr, name: &str) -> Ws {
        let url = format!("ws://{}/ws?name={}", addr, name);
        let (ws, _) = connect_async(url.as_str()).await.unwrap();
        ws
    }

    async fn send(ws: &mut Ws, message: ClientMessage) {
        let json = message.encode().unwrap();
        ws.send(Message::Text(json.into())).await.unwrap();
    }

    async fn next_message(ws: &mut Ws) -> ServerMessage {
        loop {
            let frame = timeout(WAIT, ws.next())
                .await
                .expect("timed out waiting for frame")
                .expect("stream ended")
                .unwrap();
            if let Message::Text(text) = frame {
                if let Some(message) = ServerMessage::decode(text.as_str()).unwrap() {
                    return message;
                }
            }
        }
    }

    async fn next_view(ws: &mut Ws) -> shared::GameView {
        loop {
            match next_message(ws).await {
                ServerMessage::GameFound(view) | ServerMessage::GameUpdate(view) => return view,
                _ => continue,
            }
        }
    }

    /// Tests the greeting a fresh WebSocket connection receives
    #[tokio::test]
    async fn websocket_greeting() {
        let addr = start_server().await;
        let mut ws = open(addr, "Alice").await;

        match next_message(&mut ws).await {
            ServerMessage::PlayerUpdate(profile) => {
                assert_eq!(profile.name, "Alice");
                assert_eq!(profile.rating, shared::INITIAL_RATING);
            }
            other => panic!("Unexpected first message: {:?}", other),
        }
        assert_eq!(next_message(&mut ws).await, ServerMessage::Leaderboard(vec![]));
    }

    /// Tests a complete game over real sockets, including junk frames
    #[tokio::test]
    async fn websocket_game_end_to_end() {
        let addr = start_server().await;
        let mut alice = open(addr, "Alice").await;
        let mut bob = open(addr, "Bob").await;

        // Junk is dropped without closing the connection.
        alice.send(Message::Text("not json".into())).await.unwrap();
        alice
            .send(Message::Text(r#"{"type":"make_move","data":{"position":"x"}}"#.into()))
            .await
            .unwrap();

        send(&mut alice, ClientMessage::JoinQueue).await;
        send(&mut bob, ClientMessage::JoinQueue).await;

        let alice_view = next_view(&mut alice).await;
        let bob_view = next_view(&mut bob).await;
        assert_eq!(alice_view.game_id, bob_view.game_id);
        assert_eq!(alice_view.opponent_name, "Bob");
        assert_eq!(bob_view.opponent_name, "Alice");
        let game_id = alice_view.game_id;

        let moves = [(0.0, true), (3.0, false), (1.0, true), (4.0, false), (2.0, true)];
        let mut final_view = None;
        for (position, alice_moves) in moves {
            let mover = if alice_moves { &mut alice } else { &mut bob };
            send(mover, ClientMessage::MakeMove(MovePayload { game_id, position })).await;
            let a = next_view(&mut alice).await;
            let _ = next_view(&mut bob).await;
            final_view = Some(a);
        }

        let final_view = final_view.unwrap();
        assert_eq!(final_view.status, GameStatus::Finished);
        assert_eq!(final_view.winner, Some(Winner::X));

        match next_message(&mut bob).await {
            ServerMessage::PlayerUpdate(profile) => {
                assert_eq!(profile.losses, 1);
                assert_eq!(profile.rating, 984);
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    /// Tests the health endpoint over plain HTTP
    #[tokio::test]
    async fn health_endpoint() {
        let addr = start_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut response = String::new();
        timeout(WAIT, stream.read_to_string(&mut response))
            .await
            .unwrap()
            .unwrap();
        assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
    }

    /// Tests two headless clients playing each other to completion
    #[tokio::test]
    async fn headless_clients_play_each_other() {
        use client::input::MoveSource;
        use client::network::Client;

        let addr = start_server().await;
        let url = format!("ws://{}/ws", addr);

        let mut a = Client::connect(&url, "BotA", MoveSource::random(), 2)
            .await
            .unwrap();
        let mut b = Client::connect(&url, "BotB", MoveSource::random(), 2)
            .await
            .unwrap();

        let (ra, rb) = timeout(Duration::from_secs(10), async {
            tokio::join!(a.run(), b.run())
        })
        .await
        .expect("bots did not finish");
        assert!(ra.is_ok());
        assert!(rb.is_ok());

        assert_eq!(a.state().games_finished, 2);
        assert_eq!(b.state().games_finished, 2);

        let total = a.state().rating().unwrap() + b.state().rating().unwrap();
        assert!((1998..=2002).contains(&total), "rating total {}", total);
    }
}
