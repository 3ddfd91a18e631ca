//! Authoritative game state and rule enforcement
//!
//! A [`Game`] is only ever mutated through [`Game::apply_move`], which re-runs
//! the full validation before writing a cell. Settlement of player statistics
//! is tied to the transition into `finished` and guarded so it happens once.

use crate::registry::PlayerRecord;
use chrono::{DateTime, Utc};
use log::info;
use shared::{
    adjust_ratings, cell_index, evaluate_termination, Board, GameId, GameStatus, GameView, PlayerId, Symbol,
    Winner, BOARD_CELLS,
};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("game is not in playing state")]
    NotPlaying,
    #[error("invalid position")]
    OutOfRange,
    #[error("position already occupied")]
    CellOccupied,
    #[error("player not in this game")]
    PlayerNotInGame,
    #[error("not your turn")]
    NotYourTurn,
}

/// Result of a committed move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The game goes on and the turn passed to `next`.
    Continue { next: Symbol },
    Finished(Winner),
}

#[derive(Debug, Clone)]
pub struct Game {
    pub id: GameId,
    pub board: Board,
    pub player_x: Option<PlayerId>,
    pub player_o: Option<PlayerId>,
    pub turn: Symbol,
    pub status: GameStatus,
    pub winner: Option<Winner>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    ratings_settled: bool,
}

impl Game {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            board: [None; BOARD_CELLS],
            player_x: None,
            player_o: None,
            turn: Symbol::X,
            status: GameStatus::Waiting,
            winner: None,
            started_at: Utc::now(),
            ended_at: None,
            ratings_settled: false,
        }
    }

    /// Seats both players and moves the game into `playing`. X moves first.
    pub fn start(&mut self, player_x: PlayerId, player_o: PlayerId) {
        self.player_x = Some(player_x);
        self.player_o = Some(player_o);
        self.turn = Symbol::X;
        self.status = GameStatus::Playing;
    }

    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }

    pub fn symbol_of(&self, player_id: PlayerId) -> Option<Symbol> {
        if self.player_x == Some(player_id) {
            Some(Symbol::X)
        } else if self.player_o == Some(player_id) {
            Some(Symbol::O)
        } else {
            None
        }
    }

    pub fn player_with(&self, symbol: Symbol) -> Option<PlayerId> {
        match symbol {
            Symbol::X => self.player_x,
            Symbol::O => self.player_o,
        }
    }

    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.player_x.iter().chain(self.player_o.iter()).copied()
    }

    /// Checks a move without touching the game. Returns the mover's symbol.
    pub fn validate_move(&self, player_id: PlayerId, position: f64) -> Result<Symbol, MoveError> {
        self.check_move(player_id, position).map(|(symbol, _)| symbol)
    }

    fn check_move(&self, player_id: PlayerId, position: f64) -> Result<(Symbol, usize), MoveError> {
        if self.status != GameStatus::Playing {
            return Err(MoveError::NotPlaying);
        }

        let cell = cell_index(position).ok_or(MoveError::OutOfRange)?;

        if self.board[cell].is_some() {
            return Err(MoveError::CellOccupied);
        }

        let symbol = self
            .symbol_of(player_id)
            .ok_or(MoveError::PlayerNotInGame)?;

        if symbol != self.turn {
            return Err(MoveError::NotYourTurn);
        }

        Ok((symbol, cell))
    }

    /// Validates and commits a move, then either ends the game or passes the turn.
    pub fn apply_move(&mut self, player_id: PlayerId, position: f64) -> Result<MoveOutcome, MoveError> {
        let (symbol, cell) = self.check_move(player_id, position)?;
        self.board[cell] = Some(symbol);

        match evaluate_termination(&self.board) {
            Some(winner) => {
                self.status = GameStatus::Finished;
                self.winner = Some(winner);
                self.ended_at = Some(Utc::now());
                info!("Game {} finished: {:?}", self.id, winner);
                Ok(MoveOutcome::Finished(winner))
            }
            None => {
                self.turn = symbol.other();
                Ok(MoveOutcome::Continue { next: self.turn })
            }
        }
    }

    /// Applies the rating and win/loss/draw changes of a finished game.
    ///
    /// Returns false without touching anything if the game is not finished,
    /// was already settled, or one of its players cannot be found.
    pub fn settle_ratings(&mut self, players: &mut HashMap<PlayerId, PlayerRecord>) -> bool {
        if self.ratings_settled || !self.is_finished() {
            return false;
        }
        let (Some(winner), Some(x_id), Some(o_id)) = (self.winner, self.player_x, self.player_o)
        else {
            return false;
        };
        let (Some(rating_x), Some(rating_o)) = (
            players.get(&x_id).map(|p| p.rating),
            players.get(&o_id).map(|p| p.rating),
        ) else {
            return false;
        };

        let (new_x, new_o) = adjust_ratings(rating_x, rating_o, winner);

        if let Some(player) = players.get_mut(&x_id) {
            player.record_result(winner, Symbol::X, new_x);
        }
        if let Some(player) = players.get_mut(&o_id) {
            player.record_result(winner, Symbol::O, new_o);
        }

        self.ratings_settled = true;
        true
    }

    pub fn ratings_settled(&self) -> bool {
        self.ratings_settled
    }

    /// Builds the read model for one player. Unknown players get no symbol.
    pub fn view_for(&self, player_id: PlayerId, players: &HashMap<PlayerId, PlayerRecord>) -> GameView {
        let my_symbol = self.symbol_of(player_id);
        let opponent_name = my_symbol
            .and_then(|symbol| self.player_with(symbol.other()))
            .and_then(|opponent| players.get(&opponent))
            .map(|opponent| opponent.name.clone())
            .unwrap_or_default();

        GameView {
            game_id: self.id,
            board: self.board,
            current_turn: self.turn,
            status: self.status,
            winner: self.winner,
            my_symbol,
            opponent_name,
            is_my_turn: self.status == GameStatus::Playing && my_symbol == Some(self.turn),
        }
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}
