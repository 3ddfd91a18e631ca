//! Where the client's moves come from: a random bot or the terminal

use crate::game::choose_move;
use log::warn;
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{GameView, BOARD_CELLS};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

pub enum MoveSource {
    Random(StdRng),
    Interactive(Lines<BufReader<Stdin>>),
}

impl MoveSource {
    pub fn random() -> Self {
        MoveSource::Random(StdRng::from_entropy())
    }

    pub fn interactive() -> Self {
        MoveSource::Interactive(BufReader::new(tokio::io::stdin()).lines())
    }

    /// Produces the next cell to play. `None` means there is nothing to play
    /// or the terminal was closed.
    pub async fn next_move(&mut self, view: &GameView) -> std::io::Result<Option<usize>> {
        match self {
            MoveSource::Random(rng) => Ok(choose_move(view, rng)),
            MoveSource::Interactive(lines) => loop {
                println!("Enter a cell (0-8):");
                let Some(line) = lines.next_line().await? else {
                    return Ok(None);
                };
                match parse_position(&line, view) {
                    Some(cell) => return Ok(Some(cell)),
                    None => warn!("'{}' is not an empty cell", line.trim()),
                }
            },
        }
    }
}

/// Parses a typed cell index and checks it is free on the current board.
pub fn parse_position(line: &str, view: &GameView) -> Option<usize> {
    line.trim()
        .parse::<usize>()
        .ok()
        .filter(|cell| *cell < BOARD_CELLS && view.board[*cell].is_none())
}
