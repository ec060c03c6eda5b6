//! ABOUTME: Typed event bus and per-run execution state for the workflow engine

mod bus;
mod error;
mod event;
mod handler;
mod state;

pub use bus::EventBus;
pub use error::{Result, StateError};
pub use event::{EventEnvelope, WorkflowEvent};
pub use handler::{EventHandler, FnEventHandler};
pub use state::{Checkpoint, ExecutionState, WorkflowState};
