//! Connection, player and game bookkeeping for the session core
//!
//! The registry keeps two lifecycles apart:
//! - [`ConnectionSession`] is ephemeral and owns the outbound half of exactly
//!   one network channel. It is removed on disconnect.
//! - [`PlayerRecord`] is addressed by player identifier and outlives its
//!   connection so finished games keep counting towards the leaderboard.
//!
//! Games are retained after they finish. Retention is unbounded unless a
//! `max_finished_games` limit is configured, in which case the oldest finished
//! games are evicted first.
//!
//! The registry itself is a plain data structure; callers serialize access
//! through the process-wide lock held by the session core.

use crate::game::Game;
use chrono::{DateTime, Utc};
use log::{debug, info};
use shared::{
    GameId, PlayerId, PlayerProfile, ServerMessage, Symbol, Winner, DEFAULT_PLAYER_NAME,
    INITIAL_RATING,
};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use tokio::sync::mpsc;
use uuid::Uuid;

pub type ConnectionId = u64;

/// Where a connection currently is in its session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connected,
    Queued,
    InGame(GameId),
}

/// Identity and statistics of a player
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
    /// Symbol held in the current game, unset outside of one
    pub symbol: Option<Symbol>,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub rating: i32,
    pub last_seen: DateTime<Utc>,
}

impl PlayerRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            symbol: None,
            wins: 0,
            losses: 0,
            draws: 0,
            rating: INITIAL_RATING,
            last_seen: Utc::now(),
        }
    }

    pub fn decisions(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    /// Books the outcome of a game this player held `symbol` in.
    pub fn record_result(&mut self, winner: Winner, symbol: Symbol, new_rating: i32) {
        match winner {
            Winner::Draw => self.draws += 1,
            w if w == Winner::from(symbol) => self.wins += 1,
            _ => self.losses += 1,
        }
        self.rating = new_rating.max(0);
    }

    pub fn profile(&self) -> PlayerProfile {
        PlayerProfile {
            id: self.id,
            name: self.name.clone(),
            symbol: self.symbol,
            wins: self.wins,
            losses: self.losses,
            draws: self.draws,
            rating: self.rating,
            last_seen: self.last_seen,
        }
    }
}

/// A live connection bound to one player
#[derive(Debug)]
pub struct ConnectionSession {
    pub id: ConnectionId,
    pub player_id: PlayerId,
    pub phase: SessionPhase,
    pub connected_at: Instant,
    sender: mpsc::Sender<ServerMessage>,
}

impl ConnectionSession {
    pub fn sender(&self) -> mpsc::Sender<ServerMessage> {
        self.sender.clone()
    }
}

pub struct SessionRegistry {
    connections: HashMap<ConnectionId, ConnectionSession>,
    players: HashMap<PlayerId, PlayerRecord>,
    games: HashMap<GameId, Game>,
    /// Finished games in completion order, for eviction
    finished: VecDeque<GameId>,
    next_connection_id: ConnectionId,
    max_finished_games: Option<usize>,
}

impl SessionRegistry {
    pub fn new(max_finished_games: Option<usize>) -> Self {
        Self {
            connections: HashMap::new(),
            players: HashMap::new(),
            games: HashMap::new(),
            finished: VecDeque::new(),
            next_connection_id: 1,
            max_finished_games,
        }
    }

    /// Creates a fresh player for a new connection and binds the two.
    ///
    /// Blank names fall back to the default display name.
    pub fn register_connection(
        &mut self,
        name: Option<&str>,
        sender: mpsc::Sender<ServerMessage>,
    ) -> (ConnectionId, PlayerId) {
        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_PLAYER_NAME);
        let player = PlayerRecord::new(name);
        let player_id = player.id;

        let connection_id = self.next_connection_id;
        self.next_connection_id += 1;

        info!(
            "Connection {} registered for player {} ({})",
            connection_id, player.name, player_id
        );

        self.players.insert(player_id, player);
        self.connections.insert(
            connection_id,
            ConnectionSession {
                id: connection_id,
                player_id,
                phase: SessionPhase::Connected,
                connected_at: Instant::now(),
                sender,
            },
        );

        (connection_id, player_id)
    }

    /// Unbinds a connection. The player record stays, stamped with the time
    /// it was last seen.
    pub fn remove_connection(&mut self, connection_id: ConnectionId) -> Option<ConnectionSession> {
        let session = self.connections.remove(&connection_id)?;
        if let Some(player) = self.players.get_mut(&session.player_id) {
            player.last_seen = Utc::now();
            info!("Connection {} closed for player {}", connection_id, player.name);
        }
        Some(session)
    }

    pub fn connection(&self, connection_id: ConnectionId) -> Option<&ConnectionSession> {
        self.connections.get(&connection_id)
    }

    pub fn player_by_connection(&self, connection_id: ConnectionId) -> Option<&PlayerRecord> {
        self.connections
            .get(&connection_id)
            .and_then(|session| self.players.get(&session.player_id))
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&PlayerRecord> {
        self.players.get(&player_id)
    }

    pub fn player_mut(&mut self, player_id: PlayerId) -> Option<&mut PlayerRecord> {
        self.players.get_mut(&player_id)
    }

    pub fn players(&self) -> &HashMap<PlayerId, PlayerRecord> {
        &self.players
    }

    /// The connection currently bound to a player, if any.
    pub fn connection_for_player(&self, player_id: PlayerId) -> Option<&ConnectionSession> {
        self.connections
            .values()
            .find(|session| session.player_id == player_id)
    }

    pub fn is_connected(&self, player_id: PlayerId) -> bool {
        self.connection_for_player(player_id).is_some()
    }

    pub fn set_phase(&mut self, player_id: PlayerId, phase: SessionPhase) {
        if let Some(session) = self
            .connections
            .values_mut()
            .find(|session| session.player_id == player_id)
        {
            session.phase = phase;
        }
    }

    /// Copies out every connection's outbound sender.
    pub fn connection_senders(&self) -> Vec<(ConnectionId, mpsc::Sender<ServerMessage>)> {
        self.connections
            .values()
            .map(|session| (session.id, session.sender()))
            .collect()
    }

    pub fn put_game(&mut self, game: Game) {
        self.games.insert(game.id, game);
    }

    pub fn game(&self, game_id: GameId) -> Option<&Game> {
        self.games.get(&game_id)
    }

    pub fn game_mut(&mut self, game_id: GameId) -> Option<&mut Game> {
        self.games.get_mut(&game_id)
    }

    /// Settles a finished game and returns its players to the `Connected` phase.
    ///
    /// Returns false if the game is unknown, still running, or already settled.
    pub fn settle_game(&mut self, game_id: GameId) -> bool {
        let Some(game) = self.games.get_mut(&game_id) else {
            return false;
        };
        if !game.settle_ratings(&mut self.players) {
            return false;
        }

        let participants: Vec<PlayerId> = game.players().collect();
        for player_id in participants {
            // Released players may already be seated in a newer game.
            if self.busy_elsewhere(player_id, game_id) {
                continue;
            }
            if let Some(player) = self.players.get_mut(&player_id) {
                player.symbol = None;
            }
            self.set_phase(player_id, SessionPhase::Connected);
        }

        self.finished.push_back(game_id);
        self.evict_finished_games();
        true
    }

    /// Frees the remaining players of an unfinished game after `leaver`
    /// dropped out, so they can queue again. The game itself stays as is.
    pub fn release_opponents(&mut self, leaver: PlayerId, game_id: GameId) -> Vec<PlayerId> {
        let Some(game) = self.games.get(&game_id) else {
            return Vec::new();
        };
        if game.is_finished() {
            return Vec::new();
        }

        let opponents: Vec<PlayerId> = game
            .players()
            .filter(|player_id| *player_id != leaver)
            .filter(|player_id| {
                self.connection_for_player(*player_id)
                    .is_some_and(|session| session.phase == SessionPhase::InGame(game_id))
            })
            .collect();

        for player_id in &opponents {
            if let Some(player) = self.players.get_mut(player_id) {
                player.symbol = None;
            }
            self.set_phase(*player_id, SessionPhase::Connected);
            info!("Released player {} from abandoned game {}", player_id, game_id);
        }
        opponents
    }

    fn busy_elsewhere(&self, player_id: PlayerId, game_id: GameId) -> bool {
        matches!(
            self.connection_for_player(player_id).map(|session| session.phase),
            Some(SessionPhase::InGame(other)) if other != game_id
        )
    }

    fn evict_finished_games(&mut self) {
        let Some(limit) = self.max_finished_games else {
            return;
        };
        while self.finished.len() > limit {
            if let Some(game_id) = self.finished.pop_front() {
                self.games.remove(&game_id);
                debug!("Evicted finished game {}", game_id);
            }
        }
    }

    /// Top players by rating among those with at least one decided game.
    ///
    /// Equal ratings are ordered by player identifier so the listing is stable.
    pub fn leaderboard(&self, limit: usize) -> Vec<PlayerProfile> {
        let mut ranked: Vec<&PlayerRecord> = self
            .players
            .values()
            .filter(|player| player.decisions() > 0)
            .collect();
        ranked.sort_by(|a, b| b.rating.cmp(&a.rating).then_with(|| a.id.cmp(&b.id)));
        ranked
            .into_iter()
            .take(limit)
            .map(PlayerRecord::profile)
            .collect()
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    /// Returns the number of live connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
