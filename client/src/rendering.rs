//! Plain-text rendering for the terminal client

use shared::{Board, GameStatus, GameView, PlayerProfile, Winner};

/// Renders a board as three rows. Empty cells show their index so the
/// player can type it.
pub fn render_board(board: &Board) -> String {
    let rows: Vec<String> = board
        .chunks(3)
        .enumerate()
        .map(|(row, cells)| {
            cells
                .iter()
                .enumerate()
                .map(|(col, cell)| match cell {
                    Some(symbol) => symbol.to_string(),
                    None => (row * 3 + col).to_string(),
                })
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect();
    rows.join("\n---------\n")
}

pub fn status_line(view: &GameView) -> String {
    match (view.status, view.winner) {
        (GameStatus::Finished, Some(Winner::Draw)) => "Draw".to_string(),
        (GameStatus::Finished, Some(winner)) => {
            if view.my_symbol.map(Winner::from) == Some(winner) {
                "You won".to_string()
            } else {
                format!("{} won", view.opponent_name)
            }
        }
        _ if view.is_my_turn => "Your turn".to_string(),
        _ => format!("Waiting for {}", view.opponent_name),
    }
}

pub fn render_leaderboard(entries: &[PlayerProfile]) -> String {
    if entries.is_empty() {
        return "Leaderboard is empty".to_string();
    }
    entries
        .iter()
        .enumerate()
        .map(|(rank, entry)| {
            format!(
                "{:>2}. {:<16} {:>5}  {}W {}L {}D",
                rank + 1,
                entry.name,
                entry.rating,
                entry.wins,
                entry.losses,
                entry.draws
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
