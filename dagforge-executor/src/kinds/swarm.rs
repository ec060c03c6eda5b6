//! ABOUTME: Swarm node executor — fans an input out to every named agent member concurrently
//! ABOUTME: A single member's failure is recorded, not propagated; the swarm only fails if every member does

use std::sync::Arc;

use dagforge_core::node::{NodeConfig, NodeKind};
use dagforge_registry::Registry;
use serde_json::Value;

use crate::dispatch::{ExecutorOutput, NodeExecutor};
use crate::error::{ExecutorError, Result};

pub struct SwarmExecutor {
    registry: Arc<Registry>,
}

impl SwarmExecutor {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

#[async_trait::async_trait]
impl NodeExecutor for SwarmExecutor {
    async fn invoke(&self, node: &NodeConfig, inputs: Value) -> Result<ExecutorOutput> {
        let NodeKind::Swarm { members } = &node.kind else {
            return Err(ExecutorError::Runtime(format!("{} is not a swarm node", node.id)));
        };
        if members.is_empty() {
            return Err(ExecutorError::Validation(format!(
                "swarm node '{}' declares no members",
                node.id
            )));
        }

        let calls = members.iter().map(|member| {
            let registry = Arc::clone(&self.registry);
            let inputs = inputs.clone();
            let member = member.clone();
            async move {
                let agent = registry.get_agent(&member, Value::Null).map_err(|e| e.to_string())?;
                agent.invoke(inputs, Value::Null).await
            }
        });

        let results = futures::future::join_all(calls).await;

        let mut outputs = serde_json::Map::new();
        let mut failures = serde_json::Map::new();
        for (member, result) in members.iter().zip(results) {
            match result {
                Ok(value) => {
                    outputs.insert(member.clone(), value);
                }
                Err(error) => {
                    failures.insert(member.clone(), Value::String(error));
                }
            }
        }

        if outputs.is_empty() {
            return Err(ExecutorError::Runtime(format!(
                "every member of swarm node '{}' failed: {:?}",
                node.id, failures
            )));
        }

        Ok(ExecutorOutput::value(serde_json::json!({
            "results": outputs,
            "failures": failures,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagforge_core::node::RetryPolicy;
    use dagforge_core::schema::IoSchema;
    use dagforge_registry::{AgentFactory, AgentHandle};
    use serde_json::json;
    use std::collections::HashMap;

    struct EchoAgent(String);
    #[async_trait::async_trait]
    impl AgentHandle for EchoAgent {
        async fn invoke(&self, input: Value, _context: Value) -> std::result::Result<Value, String> {
            if self.0 == "bad" {
                return Err("boom".into());
            }
            Ok(json!({"from": self.0, "input": input}))
        }
    }

    struct EchoFactory(String);
    impl AgentFactory for EchoFactory {
        fn create(&self, _config: Value) -> std::result::Result<Arc<dyn AgentHandle>, String> {
            Ok(Arc::new(EchoAgent(self.0.clone())))
        }
    }

    fn node(members: Vec<&str>) -> NodeConfig {
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
            kind: NodeKind::Swarm {
                members: members.into_iter().map(str::to_string).collect(),
            },
        }
    }

    #[tokio::test]
    async fn aggregates_every_member_result() {
        let registry = Arc::new(Registry::new());
        registry.register_agent("a", Arc::new(EchoFactory("a".into())), false).unwrap();
        registry.register_agent("b", Arc::new(EchoFactory("b".into())), false).unwrap();
        let executor = SwarmExecutor::new(registry);
        let output = executor.invoke(&node(vec!["a", "b"]), json!({"x": 1})).await.unwrap();
        assert_eq!(output.value["results"]["a"]["from"], json!("a"));
        assert_eq!(output.value["results"]["b"]["from"], json!("b"));
    }

    #[tokio::test]
    async fn tolerates_partial_member_failure() {
        let registry = Arc::new(Registry::new());
        registry.register_agent("a", Arc::new(EchoFactory("a".into())), false).unwrap();
        registry.register_agent("bad", Arc::new(EchoFactory("bad".into())), false).unwrap();
        let executor = SwarmExecutor::new(registry);
        let output = executor.invoke(&node(vec!["a", "bad"]), json!({})).await.unwrap();
        assert!(output.value["results"].get("a").is_some());
        assert!(output.value["failures"].get("bad").is_some());
    }

    #[tokio::test]
    async fn every_member_failing_is_an_error() {
        let registry = Arc::new(Registry::new());
        registry.register_agent("bad", Arc::new(EchoFactory("bad".into())), false).unwrap();
        let executor = SwarmExecutor::new(registry);
        assert!(executor.invoke(&node(vec!["bad"]), json!({})).await.is_err());
    }

    #[tokio::test]
    async fn empty_members_is_validation_error() {
        let executor = SwarmExecutor::new(Arc::new(Registry::new()));
        let err = executor.invoke(&node(vec![]), json!({})).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Validation(_)));
    }
}
