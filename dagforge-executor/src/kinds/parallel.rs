//! ABOUTME: Parallel node executor — validates the branch config and passes it through
//! ABOUTME: Branch fan-out and `wait_strategy` enforcement is the engine's job

use dagforge_core::node::{NodeConfig, NodeKind};
use serde_json::Value;

use crate::dispatch::{ExecutorOutput, NodeExecutor};
use crate::error::{ExecutorError, Result};

/// Mirrors `LoopExecutor`: the dispatch-level call for a control-flow kind
/// only resolves and validates its own config; `dagforge-workflows` reads
/// this output to schedule the actual branch sub-executions.
pub struct ParallelExecutor;

#[async_trait::async_trait]
impl NodeExecutor for ParallelExecutor {
    async fn invoke(&self, node: &NodeConfig, _inputs: Value) -> Result<ExecutorOutput> {
        let NodeKind::Parallel(config) = &node.kind else {
            return Err(ExecutorError::Runtime(format!("{} is not a parallel node", node.id)));
        };
        if config.branches.is_empty() {
            return Err(ExecutorError::Validation(format!(
                "parallel node '{}' declares no branches",
                node.id
            )));
        }
        Ok(ExecutorOutput::value(serde_json::json!({
            "branches": config.branches,
            "wait_strategy": config.wait_strategy,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagforge_core::node::{ParallelConfig, RetryPolicy, WaitStrategy};
    use dagforge_core::schema::IoSchema;
    use serde_json::json;
    use std::collections::HashMap;

    fn node(branches: Vec<Vec<&str>>, wait_strategy: WaitStrategy) -> NodeConfig {
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
            kind: NodeKind::Parallel(ParallelConfig {
                branches: branches
                    .into_iter()
                    .map(|b| b.into_iter().map(str::to_string).collect())
                    .collect(),
                wait_strategy,
            }),
        }
    }

    #[tokio::test]
    async fn passes_through_branches_and_strategy() {
        let executor = ParallelExecutor;
        let output = executor
            .invoke(&node(vec![vec!["a"], vec!["b"]], WaitStrategy::Any), json!({}))
            .await
            .unwrap();
        assert_eq!(output.value["wait_strategy"], json!("any"));
        assert_eq!(output.value["branches"], json!([["a"], ["b"]]));
    }

    #[tokio::test]
    async fn empty_branches_is_validation_error() {
        let executor = ParallelExecutor;
        let err = executor
            .invoke(&node(vec![], WaitStrategy::All), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Validation(_)));
    }
}
