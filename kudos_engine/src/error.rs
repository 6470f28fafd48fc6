// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine error types.

use thiserror::Error;

use crate::questions::AnswerError;
use crate::shop::RedeemRejection;
use crate::tournament::TournamentError;

/// Errors raised by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Reading or writing local state failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Stored JSON could not be read or written.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Redemption refused.
    #[error(transparent)]
    Redeem(#[from] RedeemRejection),

    /// Answer refused.
    #[error(transparent)]
    Answer(#[from] AnswerError),

    /// Tournament misuse.
    #[error(transparent)]
    Tournament(#[from] TournamentError),

    /// No catalog item or question with this id.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
