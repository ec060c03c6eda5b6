//! ABOUTME: Loop node executor — resolves the iterable; fan-out of `body_nodes` is the engine's job
//! ABOUTME: Emits `{items, max_iterations, parallel, body_nodes}` for dagforge-workflows to schedule

use dagforge_core::node::{NodeConfig, NodeKind};
use serde_json::{json, Value};

use crate::dispatch::{ExecutorOutput, NodeExecutor};
use crate::error::{ExecutorError, Result};

fn resolve(inputs: &Value, path: &str) -> Option<Value> {
    let mut current = inputs;
    for segment in path.trim().split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current.clone())
}

pub struct LoopExecutor;

#[async_trait::async_trait]
impl NodeExecutor for LoopExecutor {
    async fn invoke(&self, node: &NodeConfig, inputs: Value) -> Result<ExecutorOutput> {
        let NodeKind::Loop(config) = &node.kind else {
            return Err(ExecutorError::Runtime(format!("{} is not a loop node", node.id)));
        };

        let iterable = resolve(&inputs, &config.iterator_path)
            .ok_or_else(|| ExecutorError::Validation(format!("iterator_path '{}' not found", config.iterator_path)))?;
        let Value::Array(items) = iterable else {
            return Err(ExecutorError::Validation(format!(
                "iterator_path '{}' did not resolve to an array",
                config.iterator_path
            )));
        };

        let bounded: Vec<Value> = items.into_iter().take(config.max_iterations).collect();
        Ok(ExecutorOutput::value(json!({
            "items": bounded,
            "max_iterations": config.max_iterations,
            "parallel": config.parallel,
            "body_nodes": config.body_nodes,
        })))
    }
}
