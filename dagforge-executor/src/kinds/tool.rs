//! ABOUTME: Tool node executor — resolves and invokes a registered tool
//! ABOUTME: Deterministic, idempotent, side effects declared by the tool itself

use std::sync::Arc;

use dagforge_core::node::{NodeConfig, NodeKind};
use dagforge_registry::Registry;
use serde_json::Value;

use crate::dispatch::{ExecutorOutput, NodeExecutor};
use crate::error::{ExecutorError, Result};

pub struct ToolExecutor {
    registry: Arc<Registry>,
}

impl ToolExecutor {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

#[async_trait::async_trait]
impl NodeExecutor for ToolExecutor {
    async fn invoke(&self, node: &NodeConfig, inputs: Value) -> Result<ExecutorOutput> {
        let NodeKind::Tool { tool_name, tool_args } = &node.kind else {
            return Err(ExecutorError::Runtime(format!("{} is not a tool node", node.id)));
        };

        let tool = self.registry.get_tool(tool_name)?;

        let mut args = tool_args.clone();
        if let (Some(args_obj), Some(inputs_obj)) = (args.as_object_mut(), inputs.as_object()) {
            for (key, value) in inputs_obj {
                args_obj.insert(key.clone(), value.clone());
            }
        }

        let output = tool
            .execute(args)
            .await
            .map_err(ExecutorError::Runtime)?;
        Ok(ExecutorOutput::value(output))
    }
}
