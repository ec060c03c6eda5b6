//! ABOUTME: Adapts the agent loop to the registry's type-erased `AgentHandle`/`AgentFactory` traits
//! ABOUTME: Keeps `dagforge-registry` free of a dependency on this crate

use std::sync::Arc;

use async_trait::async_trait;
use dagforge_memory::{InMemoryEpisodicMemory, InMemoryProceduralMemory, InMemorySemanticMemory, UnifiedMemory, WorkingMemory};
use dagforge_registry::{AgentFactory, AgentHandle, Registry};
use serde_json::{json, Value};

use crate::config::AgentRuntimeConfig;
use crate::loop_runner::AgentLoop;

/// Builds a fresh `UnifiedMemory` instance from a node's `memory_config`
/// (the `NodeKind::Agent::memory_config` JSON value, merged into the
/// invocation context by `dagforge-executor`'s agent executor). Absent a
/// `memory_config`, the agent still gets a small working memory so the
/// iteration loop always has somewhere to record tool observations.
fn build_memory(memory_config: Option<&Value>) -> Arc<UnifiedMemory> {
    let max_entries = memory_config
        .and_then(|c| c.get("max_entries"))
        .and_then(Value::as_u64)
        .unwrap_or(100) as usize;
    let embedding_dim = memory_config
        .and_then(|c| c.get("embedding_dim"))
        .and_then(Value::as_u64)
        .map(|d| d as usize);
    Arc::new(UnifiedMemory::new(
        Arc::new(WorkingMemory::new(max_entries, None)),
        Arc::new(InMemoryEpisodicMemory::new()),
        Arc::new(InMemorySemanticMemory::new(embedding_dim)),
        Arc::new(InMemoryProceduralMemory::new()),
    ))
}

/// The concrete `AgentHandle` the registry resolves a `package` name to.
/// One instance is created per invocation by `AgentHandleFactory::create`,
/// so memory is scoped to a single run and never leaks across runs.
pub struct AgentHandleAdapter {
    loop_runner: AgentLoop,
}

impl AgentHandleAdapter {
    #[must_use]
    pub fn new(loop_runner: AgentLoop) -> Self {
        Self { loop_runner }
    }
}

#[async_trait]
impl AgentHandle for AgentHandleAdapter {
    async fn invoke(&self, input: Value, context: Value) -> std::result::Result<Value, String> {
        let config = AgentRuntimeConfig::parse(&context).map_err(|e| e.to_string())?;
        let tools: Vec<String> = context
            .get("tools")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let max_iterations = context.get("max_iterations").and_then(Value::as_u64).unwrap_or(1) as usize;

        let run = self
            .loop_runner
            .run(input, &tools, max_iterations, &config)
            .await
            .map_err(|e| e.to_string())?;

        Ok(json!({
            "content": run.output["content"],
            "iterations": run.iterations,
            "termination_reason": run.termination_reason,
            "transcript": run.transcript.messages,
            "_usage": run.usage,
        }))
    }
}

/// `AgentFactory` for every agent registered under `package` built from
/// this crate's loop runner. `registry.register_agent(package, Arc::new(
/// AgentHandleFactory::new(provider, registry.clone())), false)` wires an
/// agent node kind up end to end.
pub struct AgentHandleFactory {
    provider: Arc<dyn dagforge_executor::kinds::LlmProvider>,
    registry: Arc<Registry>,
}

impl AgentHandleFactory {
    #[must_use]
    pub fn new(provider: Arc<dyn dagforge_executor::kinds::LlmProvider>, registry: Arc<Registry>) -> Self {
        Self { provider, registry }
    }
}

impl AgentFactory for AgentHandleFactory {
    fn create(&self, agent_config: Value) -> std::result::Result<Arc<dyn AgentHandle>, String> {
        let memory = build_memory(agent_config.get("memory_config").filter(|v| !v.is_null()));
        let loop_runner = AgentLoop::new(self.provider.clone(), self.registry.clone(), Some(memory));
        Ok(Arc::new(AgentHandleAdapter::new(loop_runner)))
    }
}
