use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod protocol;

pub use protocol::{ClientMessage, Envelope, MessageKind, MovePayload, ProtocolError, ServerMessage};

pub const BOARD_CELLS: usize = 9;
pub const INITIAL_RATING: i32 = 1000;
pub const K_FACTOR: f64 = 32.0;
pub const LEADERBOARD_SIZE: usize = 10;
pub const DEFAULT_PLAYER_NAME: &str = "Anonymous";

pub type PlayerId = Uuid;
pub type GameId = Uuid;

/// Rows, columns, then diagonals. Scan order decides the reported winner.
pub const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    pub fn other(self) -> Self {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbol::X => write!(f, "X"),
            Symbol::O => write!(f, "O"),
        }
    }
}

/// Empty cells are `None`.
pub type Cell = Option<Symbol>;
pub type Board = [Cell; BOARD_CELLS];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Playing,
    Finished,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    X,
    O,
    #[serde(rename = "draw")]
    Draw,
}

impl From<Symbol> for Winner {
    fn from(symbol: Symbol) -> Self {
        match symbol {
            Symbol::X => Winner::X,
            Symbol::O => Winner::O,
        }
    }
}

impl Winner {
    /// Actual score from the X player's point of view.
    pub fn score_for_x(self) -> f64 {
        match self {
            Winner::X => 1.0,
            Winner::O => 0.0,
            Winner::Draw => 0.5,
        }
    }
}

/// Public statistics of a player, as shown in `player_update` and `leaderboard`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub id: PlayerId,
    pub name: String,
    pub symbol: Option<Symbol>,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub rating: i32,
    pub last_seen: DateTime<Utc>,
}

impl PlayerProfile {
    pub fn decisions(&self) -> u32 {
        self.wins + self.losses + self.draws
    }
}

/// A game as seen by one of its players.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub game_id: GameId,
    pub board: Board,
    pub current_turn: Symbol,
    pub status: GameStatus,
    pub winner: Option<Winner>,
    pub my_symbol: Option<Symbol>,
    pub opponent_name: String,
    pub is_my_turn: bool,
}

impl GameView {
    pub fn empty_cells(&self) -> Vec<usize> {
        self.board
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_none())
            .map(|(index, _)| index)
            .collect()
    }
}

/// Returns the result of a board if it is terminal.
///
/// A completed line wins; a full board with no completed line is a draw;
/// anything else is still in play and yields `None`.
pub fn evaluate_termination(board: &Board) -> Option<Winner> {
    for [a, b, c] in WINNING_LINES {
        if let Some(symbol) = board[a] {
            if board[b] == Some(symbol) && board[c] == Some(symbol) {
                return Some(symbol.into());
            }
        }
    }

    if is_board_full(board) {
        Some(Winner::Draw)
    } else {
        None
    }
}

/// Maps a wire position to a board index. Only whole numbers in `0..9` qualify.
pub fn cell_index(position: f64) -> Option<usize> {
    let in_range = (0.0..BOARD_CELLS as f64).contains(&position);
    (in_range && position.fract() == 0.0).then(|| position as usize)
}

pub fn is_board_full(board: &Board) -> bool {
    board.iter().all(|cell| cell.is_some())
}

/// Probability that a player rated `rating` scores against `opponent`.
pub fn expected_score(rating: i32, opponent: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(opponent - rating) / 400.0))
}

/// Computes the settled ratings `(x, o)` for a finished game.
///
/// Each delta is `round(K * (actual - expected))`, and both results are
/// floored at zero.
pub fn adjust_ratings(rating_x: i32, rating_o: i32, winner: Winner) -> (i32, i32) {
    let expected_x = expected_score(rating_x, rating_o);
    let expected_o = 1.0 - expected_x;
    let actual_x = winner.score_for_x();
    let actual_o = 1.0 - actual_x;

    let delta_x = (K_FACTOR * (actual_x - expected_x)).round() as i32;
    let delta_o = (K_FACTOR * (actual_o - expected_o)).round() as i32;

    ((rating_x + delta_x).max(0), (rating_o + delta_o).max(0))
}
