//! ABOUTME: Error type for the workflow engine's own control flow (ceilings, state transitions)

use dagforge_core::result::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] dagforge_graph::GraphError),

    #[error(transparent)]
    State(#[from] dagforge_events::StateError),

    #[error("token ceiling exceeded: {total} > {ceiling}")]
    TokenCeiling { total: u64, ceiling: u64 },

    #[error("depth ceiling exceeded at level {level} (ceiling {ceiling})")]
    DepthCeiling { level: usize, ceiling: usize },

    #[error("workflow halted after node '{0}' failed")]
    Halted(String),
}

impl EngineError {
    /// Maps to `NodeExecutionResult::error`'s tag, for a workflow node's own
    /// result when it is itself embedded as a node elsewhere.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Graph(_) => ErrorKind::Validation,
            EngineError::State(_) => ErrorKind::Runtime,
            EngineError::TokenCeiling { .. } => ErrorKind::TokenBudget,
            EngineError::DepthCeiling { .. } => ErrorKind::DepthExceeded,
            EngineError::Halted(_) => ErrorKind::Upstream,
        }
    }
}
