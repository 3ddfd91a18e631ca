//! Outbound delivery to connections
//!
//! Two addressing modes are supported:
//! - **Unicast** looks up the connection bound to a player and enqueues the
//!   message on that connection's outbound channel before returning.
//! - **Broadcast** pushes the message on a single bounded queue drained by one
//!   [`BroadcastWorker`], which fans it out to every registered connection.
//!   Broadcasts are delivered in the order they were queued. Leaderboard
//!   broadcasts are queued as a marker and rendered by the worker, so the
//!   standings sent out are never older than the queue position implies.
//!
//! Target senders are copied out under the shared lock and the lock is
//! released before anything is enqueued, so a slow peer never stalls
//! unrelated work. Enqueueing never waits: a full or closed outbound channel
//! counts as a failed delivery and the connection is closed on the spot.

use crate::registry::ConnectionId;
use crate::session::CoreState;
use log::{debug, warn};
use shared::{PlayerId, ServerMessage, LEADERBOARD_SIZE};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("no connection bound to player {0}")]
    NotConnected(PlayerId),
    #[error("outbound queue of connection {0} is full")]
    QueueFull(ConnectionId),
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
    #[error("broadcast queue is closed")]
    BroadcastClosed,
}

/// Entry on the broadcast queue
#[derive(Debug)]
enum Broadcast {
    Message(ServerMessage),
    /// Standings changed; the current leaderboard is built when drained
    Leaderboard,
}

#[derive(Clone)]
pub struct Dispatcher {
    state: Arc<RwLock<CoreState>>,
    broadcast_tx: mpsc::Sender<Broadcast>,
}

impl Dispatcher {
    /// Creates a dispatcher and the worker that drains its broadcast queue.
    ///
    /// The worker does nothing until it is spawned with [`BroadcastWorker::run`].
    pub fn new(state: Arc<RwLock<CoreState>>, broadcast_capacity: usize) -> (Self, BroadcastWorker) {
        let (broadcast_tx, broadcast_rx) = mpsc::channel(broadcast_capacity.max(1));
        let worker = BroadcastWorker {
            state: Arc::clone(&state),
            broadcast_rx,
        };
        (
            Self {
                state,
                broadcast_tx,
            },
            worker,
        )
    }

    /// Delivers a message to the connection currently bound to `player_id`.
    pub async fn send_to_player(
        &self,
        player_id: PlayerId,
        message: ServerMessage,
    ) -> Result<(), DeliveryError> {
        let target = {
            let state = self.state.read().await;
            state
                .registry
                .connection_for_player(player_id)
                .map(|session| (session.id, session.sender()))
        };

        let Some((connection_id, sender)) = target else {
            debug!("Dropping {} for disconnected player {}", message.kind(), player_id);
            return Err(DeliveryError::NotConnected(player_id));
        };
        self.deliver(connection_id, &sender, message).await
    }

    /// Delivers a message to one specific connection.
    pub async fn send_to_connection(
        &self,
        connection_id: ConnectionId,
        message: ServerMessage,
    ) -> Result<(), DeliveryError> {
        let sender = {
            let state = self.state.read().await;
            state.registry.connection(connection_id).map(|session| session.sender())
        };

        let Some(sender) = sender else {
            return Err(DeliveryError::Closed(connection_id));
        };
        self.deliver(connection_id, &sender, message).await
    }

    /// Queues a message for every connected player.
    pub async fn broadcast(&self, message: ServerMessage) -> Result<(), DeliveryError> {
        self.enqueue(Broadcast::Message(message)).await
    }

    /// Queues the leaderboard for every connected player, as it stands when
    /// the worker gets to it.
    pub async fn broadcast_leaderboard(&self) -> Result<(), DeliveryError> {
        self.enqueue(Broadcast::Leaderboard).await
    }

    async fn enqueue(&self, entry: Broadcast) -> Result<(), DeliveryError> {
        self.broadcast_tx
            .send(entry)
            .await
            .map_err(|_| DeliveryError::BroadcastClosed)
    }

    async fn deliver(
        &self,
        connection_id: ConnectionId,
        sender: &mpsc::Sender<ServerMessage>,
        message: ServerMessage,
    ) -> Result<(), DeliveryError> {
        match try_deliver(connection_id, sender, message) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Delivery failed, closing connection {}: {}", connection_id, e);
                self.state.write().await.drop_connection(connection_id);
                Err(e)
            }
        }
    }
}

fn try_deliver(
    connection_id: ConnectionId,
    sender: &mpsc::Sender<ServerMessage>,
    message: ServerMessage,
) -> Result<(), DeliveryError> {
    sender.try_send(message).map_err(|e| match e {
        TrySendError::Full(_) => DeliveryError::QueueFull(connection_id),
        TrySendError::Closed(_) => DeliveryError::Closed(connection_id),
    })
}

/// Single consumer of the broadcast queue
pub struct BroadcastWorker {
    state: Arc<RwLock<CoreState>>,
    broadcast_rx: mpsc::Receiver<Broadcast>,
}

impl BroadcastWorker {
    /// Fans out queued broadcasts until every dispatcher handle is dropped.
    pub async fn run(mut self) {
        while let Some(entry) = self.broadcast_rx.recv().await {
            let (message, targets) = {
                let state = self.state.read().await;
                let message = match entry {
                    Broadcast::Message(message) => message,
                    Broadcast::Leaderboard => {
                        ServerMessage::Leaderboard(state.registry.leaderboard(LEADERBOARD_SIZE))
                    }
                };
                (message, state.registry.connection_senders())
            };

            let mut failed = Vec::new();
            for (connection_id, sender) in &targets {
                if let Err(e) = try_deliver(*connection_id, sender, message.clone()) {
                    warn!("Broadcast to connection {} failed: {}", connection_id, e);
                    failed.push(*connection_id);
                }
            }

            debug!(
                "Broadcast {} to {} connections",
                message.kind(),
                targets.len() - failed.len()
            );

            if !failed.is_empty() {
                let mut state = self.state.write().await;
                for connection_id in failed {
                    state.drop_connection(connection_id);
                }
            }
        }
        debug!("Broadcast queue closed");
    }
}
