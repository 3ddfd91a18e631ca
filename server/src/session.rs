//! Session core: routes decoded client messages to the matchmaker and the
//! rules engine, commits the results to the registry and notifies players
//!
//! All shared mutable state sits behind one `RwLock<CoreState>`. Every
//! operation takes the lock, computes the messages it needs to send while
//! holding it, releases it, and only then hands those messages to the
//! [`Dispatcher`]. No network I/O ever happens with the lock held.

use crate::config::ServerConfig;
use crate::dispatcher::{BroadcastWorker, Dispatcher};
use crate::game::{Game, MoveError, MoveOutcome};
use crate::matchmaker::Matchmaker;
use crate::registry::{ConnectionId, PlayerRecord, SessionPhase, SessionRegistry};
use log::{debug, info, warn};
use shared::{
    ClientMessage, GameId, GameView, PlayerId, PlayerProfile, ServerMessage, LEADERBOARD_SIZE,
};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Game not found")]
    GameNotFound,
    #[error("already in a game")]
    AlreadyInGame,
    #[error(transparent)]
    Move(#[from] MoveError),
}

type Notices = Vec<(PlayerId, ServerMessage)>;

/// Everything the lock protects
pub struct CoreState {
    pub registry: SessionRegistry,
    pub matchmaker: Matchmaker,
}

struct MoveReport {
    notices: Notices,
    leaderboard_changed: bool,
}

impl CoreState {
    pub fn new(max_finished_games: Option<usize>) -> Self {
        Self {
            registry: SessionRegistry::new(max_finished_games),
            matchmaker: Matchmaker::new(),
        }
    }

    /// Deregisters a connection and purges its player from the queue. An
    /// opponent left behind in an unfinished game is free to queue again.
    ///
    /// Safe to call more than once; later calls return `None`.
    pub fn drop_connection(&mut self, connection_id: ConnectionId) -> Option<PlayerId> {
        let session = self.registry.remove_connection(connection_id)?;
        if self.matchmaker.leave(session.player_id) {
            debug!("Removed player {} from queue on disconnect", session.player_id);
        }
        if let SessionPhase::InGame(game_id) = session.phase {
            self.registry.release_opponents(session.player_id, game_id);
        }
        Some(session.player_id)
    }

    /// One message per participant, each carrying that player's view.
    fn game_notices(&self, game_id: GameId, wrap: fn(GameView) -> ServerMessage) -> Notices {
        let Some(game) = self.registry.game(game_id) else {
            return Vec::new();
        };
        game.players()
            .map(|player_id| {
                let view = game.view_for(player_id, self.registry.players());
                (player_id, wrap(view))
            })
            .collect()
    }

    fn commit_move(
        &mut self,
        player_id: PlayerId,
        game_id: GameId,
        position: f64,
    ) -> Result<MoveReport, SessionError> {
        let game = self
            .registry
            .game_mut(game_id)
            .ok_or(SessionError::GameNotFound)?;
        let outcome = game.apply_move(player_id, position)?;
        let participants: Vec<PlayerId> = game.players().collect();

        let mut notices = self.game_notices(game_id, ServerMessage::GameUpdate);

        let leaderboard_changed = match outcome {
            MoveOutcome::Continue { .. } => false,
            MoveOutcome::Finished(winner) => {
                if !self.registry.settle_game(game_id) {
                    warn!("Game {} finished ({:?}) but could not be settled", game_id, winner);
                }
                for participant in participants {
                    if let Some(player) = self.registry.player(participant) {
                        notices.push((participant, ServerMessage::PlayerUpdate(player.profile())));
                    }
                }
                true
            }
        };

        Ok(MoveReport {
            notices,
            leaderboard_changed,
        })
    }
}

/// Cheap-to-clone handle on the shared session state
#[derive(Clone)]
pub struct SessionCore {
    state: Arc<RwLock<CoreState>>,
    dispatcher: Dispatcher,
    outbound_capacity: usize,
}

impl SessionCore {
    /// Builds the core and the broadcast worker the caller must spawn.
    pub fn new(config: &ServerConfig) -> (Self, BroadcastWorker) {
        let state = Arc::new(RwLock::new(CoreState::new(config.max_finished_games)));
        let (dispatcher, worker) = Dispatcher::new(Arc::clone(&state), config.broadcast_capacity);
        let core = Self {
            state,
            dispatcher,
            outbound_capacity: config.outbound_capacity.max(1),
        };
        (core, worker)
    }

    /// Builds the core and spawns its broadcast worker on the current runtime.
    pub fn start(config: &ServerConfig) -> Self {
        let (core, worker) = Self::new(config);
        tokio::spawn(worker.run());
        core
    }

    pub fn outbound_capacity(&self) -> usize {
        self.outbound_capacity
    }

    /// Registers a new connection with a fresh player, then sends it the
    /// player's identity and the current leaderboard.
    pub async fn connect(
        &self,
        name: Option<&str>,
        sender: mpsc::Sender<ServerMessage>,
    ) -> (ConnectionId, PlayerId) {
        let (connection_id, player_id, profile, leaderboard) = {
            let mut state = self.state.write().await;
            let (connection_id, player_id) = state.registry.register_connection(name, sender);
            let profile = state.registry.player(player_id).map(PlayerRecord::profile);
            let leaderboard = state.registry.leaderboard(LEADERBOARD_SIZE);
            (connection_id, player_id, profile, leaderboard)
        };

        if let Some(profile) = profile {
            self.reply(connection_id, ServerMessage::PlayerUpdate(profile)).await;
        }
        self.reply(connection_id, ServerMessage::Leaderboard(leaderboard))
            .await;

        (connection_id, player_id)
    }

    /// Handles one inbound message. Rule violations are reported back to the
    /// sender as an `error` message and change nothing.
    pub async fn handle_message(&self, connection_id: ConnectionId, message: ClientMessage) {
        let player_id = {
            let state = self.state.read().await;
            state.registry.connection(connection_id).map(|session| session.player_id)
        };
        let Some(player_id) = player_id else {
            debug!("Ignoring {} from unknown connection {}", message.kind(), connection_id);
            return;
        };

        let kind = message.kind();
        let result = match message {
            ClientMessage::JoinQueue => self.join_queue(player_id).await,
            ClientMessage::LeaveQueue => {
                self.leave_queue(player_id).await;
                Ok(())
            }
            ClientMessage::MakeMove(payload) => {
                self.make_move(player_id, payload.game_id, payload.position)
                    .await
            }
            ClientMessage::RequestLeaderboard => {
                let leaderboard = self.leaderboard().await;
                self.reply(connection_id, ServerMessage::Leaderboard(leaderboard))
                    .await;
                Ok(())
            }
        };

        if let Err(e) = result {
            debug!("Rejected {} from player {}: {}", kind, player_id, e);
            self.notify(player_id, ServerMessage::error(e.to_string()))
                .await;
        }
    }

    /// Ends a connection's session. Any game it was playing stays unfinished.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let dropped = self.state.write().await.drop_connection(connection_id);
        if let Some(player_id) = dropped {
            info!("Player {} disconnected", player_id);
        }
    }

    async fn join_queue(&self, player_id: PlayerId) -> Result<(), SessionError> {
        let notices = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;

            match state
                .registry
                .connection_for_player(player_id)
                .map(|session| session.phase)
            {
                None => return Ok(()),
                Some(SessionPhase::InGame(_)) => return Err(SessionError::AlreadyInGame),
                Some(_) => {}
            }

            if !state.matchmaker.join(player_id) {
                return Ok(());
            }
            state.registry.set_phase(player_id, SessionPhase::Queued);

            match state.matchmaker.try_match(&mut state.registry) {
                Some(game_id) => state.game_notices(game_id, ServerMessage::GameFound),
                None => Vec::new(),
            }
        };

        self.notify_all(notices).await;
        Ok(())
    }

    async fn leave_queue(&self, player_id: PlayerId) {
        let mut state = self.state.write().await;
        if state.matchmaker.leave(player_id) {
            state.registry.set_phase(player_id, SessionPhase::Connected);
            info!("Player {} left the queue", player_id);
        }
    }

    async fn make_move(
        &self,
        player_id: PlayerId,
        game_id: GameId,
        position: f64,
    ) -> Result<(), SessionError> {
        let report = {
            let mut state = self.state.write().await;
            state.commit_move(player_id, game_id, position)?
        };

        self.notify_all(report.notices).await;

        if report.leaderboard_changed {
            if let Err(e) = self.dispatcher.broadcast_leaderboard().await {
                warn!("Failed to queue leaderboard broadcast: {}", e);
            }
        }
        Ok(())
    }

    async fn reply(&self, connection_id: ConnectionId, message: ServerMessage) {
        if let Err(e) = self.dispatcher.send_to_connection(connection_id, message).await {
            debug!("Reply to connection {} not delivered: {}", connection_id, e);
        }
    }

    async fn notify(&self, player_id: PlayerId, message: ServerMessage) {
        if let Err(e) = self.dispatcher.send_to_player(player_id, message).await {
            debug!("Message to player {} not delivered: {}", player_id, e);
        }
    }

    async fn notify_all(&self, notices: Notices) {
        for (player_id, message) in notices {
            self.notify(player_id, message).await;
        }
    }

    pub async fn leaderboard(&self) -> Vec<PlayerProfile> {
        self.state.read().await.registry.leaderboard(LEADERBOARD_SIZE)
    }

    pub async fn player(&self, player_id: PlayerId) -> Option<PlayerRecord> {
        self.state.read().await.registry.player(player_id).cloned()
    }

    pub async fn game(&self, game_id: GameId) -> Option<Game> {
        self.state.read().await.registry.game(game_id).cloned()
    }

    pub async fn phase(&self, connection_id: ConnectionId) -> Option<SessionPhase> {
        let state = self.state.read().await;
        state.registry.connection(connection_id).map(|session| session.phase)
    }

    pub async fn queued_players(&self) -> Vec<PlayerId> {
        self.state.read().await.matchmaker.waiting().copied().collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.registry.len()
    }
}
