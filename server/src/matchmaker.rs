//! FIFO matchmaking queue
//!
//! Players are paired strictly in join order. A pairing only turns into a game
//! if both players still have a live connection; otherwise the attempt is
//! abandoned and neither identifier goes back into the queue.

use crate::game::Game;
use crate::registry::{SessionPhase, SessionRegistry};
use chrono::Utc;
use log::{debug, info, warn};
use shared::{GameId, PlayerId, Symbol};
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct Matchmaker {
    waiting: VecDeque<PlayerId>,
    matches_made: u64,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a player to the queue. Returns false if already queued.
    pub fn join(&mut self, player_id: PlayerId) -> bool {
        if self.contains(player_id) {
            debug!("Player {} already in queue", player_id);
            return false;
        }
        self.waiting.push_back(player_id);
        info!("Player {} queued. Queue size: {}", player_id, self.waiting.len());
        true
    }

    /// Removes a player from the queue. Returns false if not queued.
    pub fn leave(&mut self, player_id: PlayerId) -> bool {
        match self.waiting.iter().position(|id| *id == player_id) {
            Some(index) => {
                self.waiting.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.waiting.contains(&player_id)
    }

    pub fn waiting(&self) -> impl Iterator<Item = &PlayerId> {
        self.waiting.iter()
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn matches_made(&self) -> u64 {
        self.matches_made
    }

    /// Pairs the two longest-waiting players into a new game.
    ///
    /// The first dequeued player gets X, the second O. The game is stored in
    /// the registry in `playing` status and both sessions move to `InGame`.
    /// Both players' last-seen time is refreshed.
    pub fn try_match(&mut self, registry: &mut SessionRegistry) -> Option<GameId> {
        if self.waiting.len() < 2 {
            return None;
        }
        let first = self.waiting.pop_front()?;
        let second = self.waiting.pop_front()?;

        if !registry.is_connected(first) || !registry.is_connected(second) {
            warn!(
                "Abandoning match between {} and {}: player no longer connected",
                first, second
            );
            registry.set_phase(first, SessionPhase::Connected);
            registry.set_phase(second, SessionPhase::Connected);
            return None;
        }

        let mut game = Game::new();
        game.start(first, second);
        let game_id = game.id;

        for (player_id, symbol) in [(first, Symbol::X), (second, Symbol::O)] {
            if let Some(player) = registry.player_mut(player_id) {
                player.symbol = Some(symbol);
                player.last_seen = Utc::now();
            }
            registry.set_phase(player_id, SessionPhase::InGame(game_id));
        }
        registry.put_game(game);
        self.matches_made += 1;

        info!(
            "Created game {} between {} (X) and {} (O). Matches made: {}",
            game_id, first, second, self.matches_made
        );
        Some(game_id)
    }
}
