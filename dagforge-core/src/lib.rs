//! ABOUTME: Core node model, blueprint types, and error taxonomy for dagforge
//! ABOUTME: Foundation layer shared by the graph, executor, and workflow engine crates

pub mod error;
pub mod node;
pub mod blueprint;
pub mod result;
pub mod schema;

pub use error::{DagForgeError, Result};
pub use node::{
    ConditionConfig, LoopConfig, NodeConfig, NodeId, NodeKind, ParallelConfig, RecursiveConfig,
    RetryPolicy, WaitStrategy, WorkflowRefConfig,
};
pub use blueprint::Blueprint;
pub use result::{ErrorKind, NodeExecutionResult, NodeMetadata, Usage};
pub use schema::{IoSchema, SchemaType};
