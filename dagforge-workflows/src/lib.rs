//! ABOUTME: Workflow engine crate — turns a `Blueprint` into level-by-level scheduled execution
//! ABOUTME: Depends on `dagforge-executor` for per-node dispatch and `dagforge-registry` only through the adapter types here

mod branch;
mod config;
mod engine;
mod error;
mod weight;

pub use branch::BranchResolver;
pub use config::{DepthGuard, EngineConfig, FailurePolicy, TokenGuard};
pub use engine::{register_workflow, EngineWorkflowFactory, EngineWorkflowHandle, RunOutcome, WorkflowEngine};
pub use error::{EngineError, Result};
pub use weight::complexity_estimate;
