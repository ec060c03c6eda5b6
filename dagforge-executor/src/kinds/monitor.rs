//! ABOUTME: Monitor node executor — summarizes the health of another node's output
//! ABOUTME: Reads its target via `input_mappings`, since `invoke` never sees the context store directly

use dagforge_core::node::{NodeConfig, NodeKind};
use serde_json::Value;

use crate::dispatch::{ExecutorOutput, NodeExecutor};
use crate::error::{ExecutorError, Result};

/// A monitor node doesn't produce domain output; it inspects
/// `target_node_id`'s resolved output (wired in as `inputs["target"]` by
/// the blueprint author's `input_mappings`, exactly like any other
/// cross-node reference) and reports a lightweight status summary for
/// dashboards/alerting to consume downstream.
pub struct MonitorExecutor;

#[async_trait::async_trait]
impl NodeExecutor for MonitorExecutor {
    async fn invoke(&self, node: &NodeConfig, inputs: Value) -> Result<ExecutorOutput> {
        let NodeKind::Monitor { target_node_id } = &node.kind else {
            return Err(ExecutorError::Runtime(format!("{} is not a monitor node", node.id)));
        };

        let target = inputs.get("target").cloned().unwrap_or(Value::Null);
        let healthy = !target.is_null();
        let status = if healthy { "ok" } else { "missing" };

        Ok(ExecutorOutput::value(serde_json::json!({
            "target_node_id": target_node_id,
            "status": status,
            "healthy": healthy,
            "observed": target,
        })))
    }
}
