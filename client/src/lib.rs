//! # Tic-Tac-Toe Client Library
//!
//! A headless WebSocket client for the tic-tac-toe session server. It joins
//! the matchmaking queue, plays the games it is matched into and reports the
//! resulting rating. Useful for load testing the server and as a terminal
//! front end.
//!
//! The server is authoritative: the client only mirrors the last snapshots it
//! received and proposes moves when the server says it is its turn.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Local mirror of the player's profile, current game and leaderboard, plus
//! the translation of server messages into client events.
//!
//! ### Input Module (`input`)
//! Move sources: a random bot or lines typed on stdin.
//!
//! ### Network Module (`network`)
//! Connection handling and the main receive loop.
//!
//! ### Rendering Module (`rendering`)
//! Plain-text board and leaderboard output.

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
