//! ABOUTME: Error type for the agent iteration loop

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("tool '{0}' is not in this agent's allowed_tools")]
    ToolNotAllowed(String),

    #[error("tool lookup failed: {0}")]
    ToolLookup(String),

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("provider call failed: {0}")]
    Provider(String),

    #[error("memory operation failed: {0}")]
    Memory(#[from] dagforge_memory::MemoryError),
}
