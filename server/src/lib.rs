//! # Tic-Tac-Toe Session Server
//!
//! This library provides the authoritative server for online two-player
//! tic-tac-toe. Clients connect over WebSocket, queue for a match, and submit
//! moves; the server owns every board, decides every outcome, and keeps the
//! ratings that feed the public leaderboard.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Rules
//! Clients only ever propose moves. Each proposal is validated against the
//! current game (status, range, occupancy, seat and turn) before anything is
//! written, and rejected proposals leave the game untouched.
//!
//! ### Session Management
//! Every connection is bound to a freshly created player. The player record
//! outlives the connection so finished games keep counting towards the
//! leaderboard after the player leaves.
//!
//! ### Matchmaking and Rating
//! Players are paired in strict arrival order. When a game ends both players'
//! win/loss/draw tallies and ELO ratings are updated exactly once, and the new
//! leaderboard is broadcast to everyone online.
//!
//! ## Architecture Design
//!
//! ### Shared State Behind One Lock
//! The registry and the matchmaking queue live in a single
//! `tokio::sync::RwLock`. Each operation computes the messages it needs to
//! send while holding the lock and sends them only after releasing it.
//!
//! ### Per-Connection Outbound Queues
//! Each connection owns a bounded outbound channel drained by its socket task.
//! Unicast messages are enqueued directly; broadcasts go through one shared
//! queue and a single worker so every connection sees them in the same order.
//!
//! ## Module Organization
//!
//! - [`game`] - board state, move validation and rating settlement
//! - [`registry`] - connections, players and retained games
//! - [`matchmaker`] - FIFO pairing of waiting players
//! - [`dispatcher`] - unicast and broadcast delivery
//! - [`session`] - message routing and the orchestrating core
//! - [`network`] - WebSocket and HTTP transport
//! - [`config`] - runtime settings

pub mod config;
pub mod dispatcher;
pub mod game;
pub mod matchmaker;
pub mod network;
pub mod registry;
pub mod session;

pub use config::ServerConfig;
pub use network::{Server, ServerError};
pub use session::{SessionCore, SessionError};
