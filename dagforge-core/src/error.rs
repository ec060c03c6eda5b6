//! ABOUTME: Error taxonomy for dagforge-core
//! ABOUTME: Shared error taxonomy so downstream crates can match on kind

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, DagForgeError>;

/// Errors raised while building or validating node/blueprint data.
///
/// `Validation`, `NotFound`, `PreconditionRequired`, `Conflict` are reused
/// verbatim by the storage and graph crates via `#[from]` conversions.
#[derive(Debug, Error)]
pub enum DagForgeError {
    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("node not found: {0}")]
    NotFound(String),

    #[error("cycle detected among nodes: {0:?}")]
    Cycle(Vec<String>),

    #[error("missing dependency '{dep}' referenced by node '{node}'")]
    MissingDependency { node: String, dep: String },

    #[error("self-dependency on node '{0}'")]
    SelfDependency(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}
