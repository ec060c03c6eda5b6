//! ABOUTME: Nested-workflow node executor — resolves `workflow_ref` and runs it as a sub-DAG
//! ABOUTME: The nested run's tokens/costs are merged into the parent by the engine, not here

use std::sync::Arc;

use dagforge_core::node::{NodeConfig, NodeKind};
use dagforge_registry::Registry;
use serde_json::Value;

use crate::dispatch::{ExecutorOutput, NodeExecutor};
use crate::error::{ExecutorError, Result};

pub struct WorkflowExecutor {
    registry: Arc<Registry>,
}

impl WorkflowExecutor {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

#[async_trait::async_trait]
impl NodeExecutor for WorkflowExecutor {
    async fn invoke(&self, node: &NodeConfig, inputs: Value) -> Result<ExecutorOutput> {
        let NodeKind::Workflow(config) = &node.kind else {
            return Err(ExecutorError::Runtime(format!("{} is not a workflow node", node.id)));
        };

        let handle = self
            .registry
            .get_workflow(&config.workflow_ref, config.config_overrides.clone())?;
        let output = handle.run(inputs).await.map_err(ExecutorError::Runtime)?;

        let filtered = if config.exposed_outputs.is_empty() {
            output
        } else {
            let mut filtered = serde_json::Map::new();
            if let Some(obj) = output.as_object() {
                for key in &config.exposed_outputs {
                    if let Some(value) = obj.get(key) {
                        filtered.insert(key.clone(), value.clone());
                    }
                }
            }
            Value::Object(filtered)
        };

        Ok(ExecutorOutput::value(filtered))
    }
}
