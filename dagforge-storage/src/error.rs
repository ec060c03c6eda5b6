//! ABOUTME: Error type for the blueprint store, mirroring the precondition/conflict
//! ABOUTME: taxonomy an HTTP host surfaces as 428/409/422/404

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blueprint '{0}' not found")]
    NotFound(String),

    /// No `lock` header presented on a mutating operation.
    #[error("version lock required for blueprint '{0}'")]
    PreconditionRequired(String),

    /// Presented lock does not match the store's current lock.
    #[error("version lock mismatch for blueprint '{id}': presented '{presented}', current '{current}'")]
    Conflict {
        id: String,
        presented: String,
        current: String,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Graph(#[from] dagforge_graph::GraphError),

    #[error(transparent)]
    Node(#[from] dagforge_core::DagForgeError),
}
