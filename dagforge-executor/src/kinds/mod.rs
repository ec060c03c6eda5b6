//! ABOUTME: One `NodeExecutor` implementation per node kind, selected by `NodeKind::label()`

mod agent;
mod code;
mod condition;
mod human;
mod llm;
mod loop_node;
mod monitor;
mod parallel;
mod recursive;
mod swarm;
mod tool;
mod workflow;

pub use agent::AgentExecutor;
pub use code::CodeExecutor;
pub use condition::ConditionExecutor;
pub use human::HumanExecutor;
pub use llm::{LlmCompletion, LlmExecutor, LlmProvider};
pub use loop_node::LoopExecutor;
pub use monitor::MonitorExecutor;
pub use parallel::ParallelExecutor;
pub use recursive::RecursiveExecutor;
pub use swarm::SwarmExecutor;
pub use tool::ToolExecutor;
pub use workflow::WorkflowExecutor;
