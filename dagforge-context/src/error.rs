//! ABOUTME: Error type for context store operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContextError>;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("key '{0}' not found in context")]
    NotFound(String),

    #[error("value for '{key}' failed schema validation: {message}")]
    SchemaMismatch { key: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
