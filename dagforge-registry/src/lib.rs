//! ABOUTME: Process-wide registry mapping (node-kind, name) to tool/agent/workflow factories
//! ABOUTME: Append-mostly; overwrite requires `force=true` and is refused once the registry is locked for execution

mod error;
mod registry;

pub use error::{RegistryError, Result};
pub use registry::{
    AgentFactory, AgentHandle, Registry, RegistryEntry, Tool, ToolFactory, WorkflowFactory,
    WorkflowHandle,
};
