//! ABOUTME: Agent node executor — delegates to the registered `AgentHandle`
//! ABOUTME: The iterate/tool-call loop itself lives in dagforge-agents behind that trait

use std::sync::Arc;

use dagforge_core::node::{NodeConfig, NodeKind};
use dagforge_core::result::Usage;
use dagforge_registry::Registry;
use serde_json::Value;

use crate::dispatch::{ExecutorOutput, NodeExecutor};
use crate::error::{ExecutorError, Result};

pub struct AgentExecutor {
    registry: Arc<Registry>,
}

impl AgentExecutor {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

/// `AgentHandle::invoke`'s `context` parameter carries more than the bare
/// `agent_config`: the node's `tools`/`max_iterations`/`memory_config` are
/// merged in under reserved keys so the agent runtime (which has no other
/// channel back to the node's declared fields) can see its own budget and
/// tool allowlist. `agent_config`'s own keys win on conflict.
fn build_invocation_context(
    agent_config: &Value,
    tools: &[String],
    max_iterations: usize,
    memory_config: &Option<Value>,
) -> Value {
    let mut merged = serde_json::json!({
        "tools": tools,
        "max_iterations": max_iterations,
        "memory_config": memory_config,
    });
    if let (Some(merged_obj), Some(override_obj)) = (merged.as_object_mut(), agent_config.as_object()) {
        for (key, value) in override_obj {
            merged_obj.insert(key.clone(), value.clone());
        }
    }
    merged
}

#[async_trait::async_trait]
impl NodeExecutor for AgentExecutor {
    async fn invoke(&self, node: &NodeConfig, inputs: Value) -> Result<ExecutorOutput> {
        let NodeKind::Agent {
            package,
            agent_config,
            tools,
            max_iterations,
            memory_config,
        } = &node.kind
        else {
            return Err(ExecutorError::Runtime(format!("{} is not an agent node", node.id)));
        };

        let context = build_invocation_context(agent_config, tools, *max_iterations, memory_config);
        let agent = self.registry.get_agent(package, context.clone())?;
        let output = agent
            .invoke(inputs, context)
            .await
            .map_err(ExecutorError::Runtime)?;

        // Agents report usage inline under a reserved `_usage` key (since
        // `AgentHandle::invoke` returns a bare `Value`, not the richer
        // `ExecutorOutput` shape); lift it out so the dispatcher's usage
        // accounting step sees it like any LLM node does.
        let usage = output
            .get("_usage")
            .and_then(|v| serde_json::from_value::<Usage>(v.clone()).ok());
        let mut value = output;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("_usage");
        }
        Ok(ExecutorOutput { value, usage })
    }
}
