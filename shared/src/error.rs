//! Error taxonomy shared by the server and its clients
//!
//! Every rejection carries a specific reason so a client can tell
//! "illegal move: ko" apart from "illegal move: occupied". Both enums are
//! serializable and travel over the wire unchanged.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A rules violation detected by the board state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum MoveError {
    #[error("the game is over")]
    GameOver,
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("point is outside the board")]
    OutOfBounds,
    #[error("point is occupied")]
    Occupied,
    #[error("move would be suicide")]
    Suicide,
    #[error("move would retake the ko")]
    Ko,
    #[error("stones cannot be played while dead stones are being agreed")]
    ScoringInProgress,
    #[error("dead stones can only be marked after two passes")]
    NotInScoring,
}

/// Failure of any request against a game.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("game not found")]
    NotFound,
    #[error("game state changed concurrently, retry")]
    Conflict,
    #[error("illegal move: {0}")]
    InvalidMove(#[from] MoveError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    /// True for failures a client should simply retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GameError::Conflict)
    }
}

impl From<serde_json::Error> for GameError {
    fn from(err: serde_json::Error) -> Self {
        GameError::Internal(format!("serialization failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasons_are_distinct() {
        let ko = GameError::from(MoveError::Ko).to_string();
        let occupied = GameError::from(MoveError::Occupied).to_string();
        assert_eq!(ko, "illegal move: move would retake the ko");
        assert_eq!(occupied, "illegal move: point is occupied");
    }

    #[test]
    fn test_only_conflict_is_retryable() {
        assert!(GameError::Conflict.is_retryable());
        assert!(!GameError::NotFound.is_retryable());
        assert!(!GameError::InvalidMove(MoveError::Suicide).is_retryable());
    }

    #[test]
    fn test_error_survives_bincode() {
        let err = GameError::InvalidMove(MoveError::Ko);
        let bytes = bincode::serialize(&err).unwrap();
        let back: GameError = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, err);
    }
}
