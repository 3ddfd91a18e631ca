use crate::game::{ClientEvent, ClientGameState};
use crate::input::MoveSource;
use crate::rendering::{render_board, render_leaderboard, status_line};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{ClientMessage, GameId, MovePayload, ServerMessage};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Builds the upgrade URL with the display name as a query parameter.
pub fn connect_url(server: &str, name: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(server)?;
    url.query_pairs_mut().append_pair("name", name);
    Ok(url)
}

/// Headless client that queues, plays a number of games and disconnects
pub struct Client {
    sender: SplitSink<WsStream, Message>,
    receiver: SplitStream<WsStream>,
    state: ClientGameState,
    moves: MoveSource,
    games_to_play: u32,
    verbose: bool,
}

impl Client {
    pub async fn connect(
        server: &str,
        name: &str,
        moves: MoveSource,
        games_to_play: u32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let url = connect_url(server, name)?;
        info!("Connecting to {}", url);

        let (stream, _) = connect_async(url.as_str()).await?;
        let (sender, receiver) = stream.split();
        let verbose = matches!(moves, MoveSource::Interactive(_));

        Ok(Client {
            sender,
            receiver,
            state: ClientGameState::new(),
            moves,
            games_to_play: games_to_play.max(1),
            verbose,
        })
    }

    pub fn state(&self) -> &ClientGameState {
        &self.state
    }

    fn done(&self) -> bool {
        self.state.games_finished >= self.games_to_play
    }

    async fn send(&mut self, message: ClientMessage) -> Result<(), Box<dyn std::error::Error>> {
        let json = message.encode()?;
        self.sender.send(Message::Text(json.into())).await?;
        Ok(())
    }

    /// Joins the queue and plays until the requested number of games is done
    /// or the server closes the connection.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.send(ClientMessage::JoinQueue).await?;
        info!("Waiting for an opponent...");

        while let Some(frame) = self.receiver.next().await {
            let text = match frame? {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let message = match ServerMessage::decode(text.as_str()) {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Ignoring malformed server message: {}", e);
                    continue;
                }
            };

            let event = self.state.apply(message);
            self.show(&event);

            match event {
                ClientEvent::YourTurn(game_id) => self.play_turn(game_id).await?,
                ClientEvent::GameOver(winner) => {
                    info!(
                        "Game {} of {} over: {:?}",
                        self.state.games_finished, self.games_to_play, winner
                    );
                    if !self.done() {
                        self.send(ClientMessage::JoinQueue).await?;
                    }
                }
                // Settled stats follow the final game update.
                ClientEvent::Identified if self.done() => break,
                ClientEvent::Rejected(reason) => warn!("Server rejected request: {}", reason),
                _ => {}
            }
        }

        if let Some(rating) = self.state.rating() {
            info!("Final rating: {}", rating);
        }
        self.sender.close().await?;
        Ok(())
    }

    async fn play_turn(&mut self, game_id: GameId) -> Result<(), Box<dyn std::error::Error>> {
        let Some(view) = self.state.view.clone() else {
            return Ok(());
        };
        match self.moves.next_move(&view).await? {
            Some(position) => {
                debug!("Playing cell {} in game {}", position, game_id);
                self.send(ClientMessage::MakeMove(MovePayload {
                    game_id,
                    position: position as f64,
                }))
                .await
            }
            None => Ok(()),
        }
    }

    fn show(&self, event: &ClientEvent) {
        if !self.verbose {
            return;
        }
        match event {
            ClientEvent::LeaderboardChanged => {
                println!("\n{}\n", render_leaderboard(&self.state.leaderboard));
            }
            ClientEvent::MatchFound
            | ClientEvent::YourTurn(_)
            | ClientEvent::OpponentTurn
            | ClientEvent::GameOver(_) => {
                if let Some(view) = &self.state.view {
                    println!("\n{}\n\n{}", render_board(&view.board), status_line(view));
                }
            }
            _ => {}
        }
    }
}
