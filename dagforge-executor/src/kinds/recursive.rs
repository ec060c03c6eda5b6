//! ABOUTME: Recursive node executor — echoes the caller-declared recursion signal
//! ABOUTME: Convergence is caller-declared: this node never computes it itself

use dagforge_core::node::{NodeConfig, NodeKind};
use serde_json::Value;

use crate::dispatch::{ExecutorOutput, NodeExecutor};
use crate::error::{ExecutorError, Result};

/// The engine re-enters `recursive_sources` whenever a recursive node's
/// output carries `_can_recurse: true` and `converged: false`. This
/// executor's own job is limited to surfacing those fields from its
/// resolved inputs (wired in by an upstream node's `input_mappings`) so
/// the engine can read them uniformly off every node's output, without
/// reaching back into the node's raw inputs itself.
pub struct RecursiveExecutor;

#[async_trait::async_trait]
impl NodeExecutor for RecursiveExecutor {
    async fn invoke(&self, node: &NodeConfig, inputs: Value) -> Result<ExecutorOutput> {
        let NodeKind::Recursive(config) = &node.kind else {
            return Err(ExecutorError::Runtime(format!("{} is not a recursive node", node.id)));
        };

        let can_recurse = inputs
            .get("can_recurse")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let converged = inputs.get("converged").and_then(Value::as_bool).unwrap_or(true);
        let recursive_context = inputs
            .get("recursive_context")
            .cloned()
            .unwrap_or(Value::Object(serde_json::Map::new()));

        Ok(ExecutorOutput::value(serde_json::json!({
            "_can_recurse": can_recurse,
            "converged": converged,
            "recursive_context": recursive_context,
            "recursive_sources": config.recursive_sources,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagforge_core::node::{RecursiveConfig, RetryPolicy};
    use dagforge_core::schema::IoSchema;
    use serde_json::json;
    use std::collections::HashMap;

    fn node() -> NodeConfig {
        NodeConfig {
            id: "n1".into(),
            name: None,
            dependencies: vec![],
            level: 0,
            input_mappings: HashMap::new(),
            output_mappings: HashMap::new(),
            input_schema: IoSchema::default(),
            output_schema: IoSchema::default(),
            use_cache: false,
            timeout_seconds: None,
            retry: RetryPolicy::default(),
            kind: NodeKind::Recursive(RecursiveConfig {
                recursive_sources: vec!["a".into(), "b".into()],
            }),
        }
    }

    #[tokio::test]
    async fn defaults_to_not_recursing() {
        let executor = RecursiveExecutor;
        let output = executor.invoke(&node(), json!({})).await.unwrap();
        assert_eq!(output.value["_can_recurse"], json!(false));
        assert_eq!(output.value["converged"], json!(true));
    }

    #[tokio::test]
    async fn echoes_declared_recursion_signal() {
        let executor = RecursiveExecutor;
        let output = executor
            .invoke(
                &node(),
                json!({"can_recurse": true, "converged": false, "recursive_context": {"x": 1}}),
            )
            .await
            .unwrap();
        assert_eq!(output.value["_can_recurse"], json!(true));
        assert_eq!(output.value["converged"], json!(false));
        assert_eq!(output.value["recursive_context"], json!({"x": 1}));
        assert_eq!(output.value["recursive_sources"], json!(["a", "b"]));
    }
}
