//! # Go Game Server Library
//!
//! This library provides the authoritative server for networked games of Go.
//! It owns the canonical state of every game, validates and applies moves,
//! runs the per-game clocks and disconnect timers, and streams every change
//! to the players and spectators attached to a game.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Game State
//! Every game lives in the [`store::GameStore`] as a versioned document.
//! Clients never mutate state directly: each request is validated against
//! the rules engine in the `shared` crate and committed with a
//! compare-and-swap, so two racing writers can never both succeed.
//!
//! ### Game Lifecycle
//! Each game with an attached stream gets a once-per-second tick that:
//! - Advances the clock of the player to move, including byo-yomi periods
//! - Resigns a player who stayed disconnected past the grace period
//! - Purges a finished game once all of its players have left
//!
//! A freshly created game also gets a join timeout and is deleted if
//! nobody joins it in time.
//!
//! ### Broadcasting
//! Every committed change is published on the game's channel as a JSON
//! envelope. The session router forwards each envelope verbatim to every
//! socket attached to that game in this process.
//!
//! ## Module Organization
//!
//! ### Store Module (`store`)
//! Versioned game documents, disconnect markers and publish channels.
//!
//! ### Orchestrator Module (`orchestrator`)
//! Create, join, move, state and scoring operations built on the store:
//! - Seat assignment and handicap setup when the second player joins
//! - Move validation, capture counting and move log recording
//! - Dead-stone proposals and mutual score confirmation
//!
//! ### Lifecycle Module (`lifecycle`)
//! Background tick and join-timeout tasks, at most one of each per game.
//!
//! ### Router Module (`router`)
//! Attaches and detaches game streams, relays chat and scoring messages,
//! and fans published envelopes out to local connections tracked by the
//! `client_manager` registry.
//!
//! ### Network Module (`network`)
//! TCP listener, per-connection framing and request dispatch.
//!
//! ### Sweep Module (`sweep`)
//! Hourly removal of games older than the stale threshold.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new(ServerConfig::default()).await?;
//!
//!     // Runs until the shutdown handle is triggered
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod client_manager;
pub mod config;
pub mod lifecycle;
pub mod network;
pub mod orchestrator;
pub mod router;
pub mod store;
pub mod sweep;
pub mod utils;
