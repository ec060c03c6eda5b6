//! ABOUTME: Error type for the memory subsystem

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("embedding dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("requested guarantee '{requested:?}' is not offered by this backend (offers {offered:?})")]
    GuaranteeMismatch {
        requested: crate::types::Guarantee,
        offered: Vec<crate::types::Guarantee>,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<String> for MemoryError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}
