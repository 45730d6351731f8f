//! Types and rules shared by the Go server and its clients

pub mod board;
pub mod codec;
pub mod error;
pub mod game;
pub mod handicap;
pub mod rank;

pub use board::{Board, Cell, Color};
pub use error::{GameError, MoveError};
pub use game::{
    ColorPreference, GameId, GameSettings, GameState, Move, Phase, PlayerHandle, RuleSet,
    TimeControl,
};
pub use rank::Rank;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Seconds a disconnected player has to come back before resigning.
pub const DISCONNECT_GRACE_SECS: u64 = 60;

/// Longest chat message relayed, in characters.
pub const MAX_CHAT_LEN: usize = 500;

/// How a connection takes part in a game stream.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Player,
    Spectator,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CreateGameRequest {
    pub settings: GameSettings,
    pub creator: Option<PlayerHandle>,
    pub creator_rank: Option<Rank>,
}

/// Packets sent from a client to the server
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ClientPacket {
    // Requests
    CreateGame(CreateGameRequest),
    JoinGame {
        game_id: GameId,
        handle: Option<PlayerHandle>,
        rank: Option<Rank>,
    },
    MakeMove {
        game_id: GameId,
        handle: PlayerHandle,
        index: i64,
    },
    GetState {
        game_id: GameId,
    },

    // Turns the connection into a game stream
    Attach {
        game_id: GameId,
        handle: PlayerHandle,
        role: Role,
    },

    // Stream messages, only applied for players
    ToggleDeadStone {
        index: usize,
    },
    FinalizeScore,
    Chat {
        text: String,
    },
}

/// Packets sent from the server to a client
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ServerPacket {
    GameCreated {
        game_id: GameId,
        handle: PlayerHandle,
    },
    Joined {
        handle: PlayerHandle,
        color: Color,
    },
    MoveAccepted {
        captured: usize,
    },
    State(Box<GameState>),
    Attached {
        game_id: GameId,
        role: Role,
        /// Tags this connection's own chat messages.
        source: String,
    },
    /// A JSON [`Envelope`] exactly as it was published.
    Update(String),
    Error(GameError),
}

/// Messages carried on a game's publish channel.
///
/// Serialized as `{"type": ..., "payload": ...}` JSON; this shape is only
/// ever encoded with `serde_json`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Envelope {
    GameState(Box<GameState>),
    ReconnectNotice {
        player: PlayerHandle,
    },
    DisconnectNotice {
        player: PlayerHandle,
        /// Seconds left before the player is resigned.
        timeout: u64,
    },
    ToggleDeadStone {
        player: PlayerHandle,
        points: Vec<usize>,
        dead_black: BTreeSet<usize>,
        dead_white: BTreeSet<usize>,
    },
    Chat {
        source: String,
        sender: PlayerHandle,
        text: String,
    },
}

impl Envelope {
    pub fn state(game: &GameState) -> Self {
        Envelope::GameState(Box::new(game.clone()))
    }

    pub fn to_json(&self) -> Result<String, GameError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, GameError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::GameState(_) => "game_state",
            Envelope::ReconnectNotice { .. } => "reconnect_notice",
            Envelope::DisconnectNotice { .. } => "disconnect_notice",
            Envelope::ToggleDeadStone { .. } => "toggle_dead_stone",
            Envelope::Chat { .. } => "chat",
        }
    }
}
