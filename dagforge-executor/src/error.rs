//! ABOUTME: Error type for executor dispatch, mapped to `ErrorKind` for retry classification

use dagforge_core::result::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExecutorError>;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("input validation failed: {0}")]
    Validation(String),

    #[error("output validation failed: {0}")]
    OutputValidation(String),

    #[error("node execution timed out after {0}s")]
    Timeout(f64),

    #[error("depth ceiling exceeded")]
    DepthExceeded,

    #[error("token budget exceeded")]
    TokenBudget,

    #[error("execution cancelled")]
    Cancelled,

    #[error("no executor registered for node kind '{0}'")]
    NoExecutorForKind(String),

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error(transparent)]
    Registry(#[from] dagforge_registry::RegistryError),

    #[error(transparent)]
    Context(#[from] dagforge_context::ContextError),
}

impl ExecutorError {
    /// Maps to the `NodeExecutionResult::error` tag.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutorError::Validation(_) | ExecutorError::OutputValidation(_) => ErrorKind::Validation,
            ExecutorError::Timeout(_) => ErrorKind::Timeout,
            ExecutorError::DepthExceeded => ErrorKind::DepthExceeded,
            ExecutorError::TokenBudget => ErrorKind::TokenBudget,
            ExecutorError::Cancelled => ErrorKind::Cancelled,
            ExecutorError::Upstream(_) => ErrorKind::Upstream,
            ExecutorError::NoExecutorForKind(_)
            | ExecutorError::Runtime(_)
            | ExecutorError::Registry(_)
            | ExecutorError::Context(_) => ErrorKind::Runtime,
        }
    }

    /// Retriable: transient IO, rate-limit, 5xx, timeout. Validation,
    /// ceilings, and cancellation are never retried.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        self.kind().is_retriable()
    }
}
