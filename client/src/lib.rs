//! # Go Game Client Library
//!
//! An async TCP client for the game server. It speaks the same
//! length-prefixed frames as the server, using the packet types from the
//! `shared` crate.
//!
//! ## Connection Modes
//!
//! ### Request Connections
//! [`network::GameClient`] sends one request at a time and waits for its
//! reply: creating, joining, moving in and inspecting games. A rejected
//! request surfaces as a typed [`shared::GameError`], so callers can tell
//! an illegal move from a lost race they should simply retry.
//!
//! ### Game Streams
//! [`network::GameClient::attach`] turns a connection into a
//! [`network::GameStream`]. The server then pushes the current state
//! followed by every published update: new game states, reconnect and
//! disconnect notices, dead-stone proposals and chat. Players may send
//! dead-stone toggles, score confirmations and chat on the same stream.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::GameClient;
//! use shared::{GameSettings, Role};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = GameClient::connect("127.0.0.1:8080").await?;
//!     let (game_id, creator) = client.create_game(GameSettings::default(), None).await?;
//!     let (handle, color) = client.join(&game_id, Some(creator), None).await?;
//!     println!("Seated as {} ({})", handle, color);
//!
//!     let mut stream = GameClient::connect("127.0.0.1:8080")
//!         .await?
//!         .attach(&game_id, handle, Role::Player)
//!         .await?;
//!     while let Some(event) = stream.next_event().await? {
//!         println!("{:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod network;
