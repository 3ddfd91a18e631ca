//! Client-side mirror of the server state
//!
//! The client never decides anything about a game. It only keeps the most
//! recent snapshots the server sent and derives what to do next from them.

use rand::seq::SliceRandom;
use rand::Rng;
use shared::{GameId, GameStatus, GameView, PlayerProfile, ServerMessage, Winner};

/// What a server message means for the client's control flow
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Identified,
    LeaderboardChanged,
    MatchFound,
    /// The server is waiting for our move in this game
    YourTurn(GameId),
    OpponentTurn,
    GameOver(Winner),
    Rejected(String),
}

#[derive(Debug, Default)]
pub struct ClientGameState {
    pub profile: Option<PlayerProfile>,
    pub view: Option<GameView>,
    pub leaderboard: Vec<PlayerProfile>,
    pub games_finished: u32,
    pub last_error: Option<String>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a server message into the local state.
    pub fn apply(&mut self, message: ServerMessage) -> ClientEvent {
        match message {
            ServerMessage::PlayerUpdate(profile) => {
                self.profile = Some(profile);
                ClientEvent::Identified
            }
            ServerMessage::Leaderboard(entries) => {
                self.leaderboard = entries;
                ClientEvent::LeaderboardChanged
            }
            ServerMessage::GameFound(view) => {
                let event = Self::turn_event(&view);
                self.view = Some(view);
                match event {
                    ClientEvent::OpponentTurn => ClientEvent::MatchFound,
                    other => other,
                }
            }
            ServerMessage::GameUpdate(view) => {
                let event = match (view.status, view.winner) {
                    (GameStatus::Finished, Some(winner)) => {
                        self.games_finished += 1;
                        ClientEvent::GameOver(winner)
                    }
                    _ => Self::turn_event(&view),
                };
                self.view = Some(view);
                event
            }
            ServerMessage::Error { reason } => {
                self.last_error = Some(reason.clone());
                ClientEvent::Rejected(reason)
            }
        }
    }

    fn turn_event(view: &GameView) -> ClientEvent {
        if view.is_my_turn {
            ClientEvent::YourTurn(view.game_id)
        } else {
            ClientEvent::OpponentTurn
        }
    }

    pub fn rating(&self) -> Option<i32> {
        self.profile.as_ref().map(|profile| profile.rating)
    }

    /// Whether the last game ended with us on the winning side.
    pub fn won_last_game(&self) -> bool {
        match &self.view {
            Some(view) => match (view.winner, view.my_symbol) {
                (Some(winner), Some(symbol)) => winner == Winner::from(symbol),
                _ => false,
            },
            None => false,
        }
    }
}

/// Picks a random empty cell, or `None` if the board is full.
pub fn choose_move<R: Rng + ?Sized>(view: &GameView, rng: &mut R) -> Option<usize> {
    view.empty_cells().choose(rng).copied()
}
