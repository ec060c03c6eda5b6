//! ABOUTME: Error type for execution-state transitions

use thiserror::Error;

use crate::state::WorkflowState;

pub type Result<T> = std::result::Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("illegal state transition from {from:?} to {to:?}")]
    IllegalTransition { from: WorkflowState, to: WorkflowState },
}
