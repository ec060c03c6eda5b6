//! ABOUTME: Tagged-union node configuration model
//! ABOUTME: One `NodeConfig` covers every node kind; kind-specific fields live in `NodeKind`

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{DagForgeError, Result};
use crate::schema::IoSchema;

/// Node identifier, unique within a single blueprint.
pub type NodeId = String;

/// Where an `input_mappings` entry pulls its value from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputSource {
    pub source_node_id: NodeId,
    /// Dotted path into `source_node_id`'s output, e.g. `"output.x"`.
    pub source_output_path: String,
}

/// Retry policy shared by every node kind.
///
/// `retries = 0` disables retries; `backoff_seconds = 0.0` disables the
/// inter-attempt sleep. Delay for attempt `n` (1-indexed) is
/// `backoff_seconds * 2^(n-1)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff_seconds: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            backoff_seconds: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given 1-indexed attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> f64 {
        if self.backoff_seconds <= 0.0 {
            return 0.0;
        }
        self.backoff_seconds * 2f64.powi(attempt.saturating_sub(1) as i32)
    }
}

/// `wait_strategy` for a parallel node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    /// Wait for every branch to finish.
    All,
    /// Complete on the first successful branch; cancel the rest.
    Any,
    /// Complete on the first branch to finish at all (success or failure).
    Race,
}

/// Kind-specific fields for a condition node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    /// Boolean expression evaluated over the context (see dagforge-executor).
    pub expression: String,
    pub true_branch: Vec<NodeId>,
    pub false_branch: Vec<NodeId>,
}

/// Kind-specific fields for a loop node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Dotted path into context that yields the iterable.
    pub iterator_path: String,
    pub body_nodes: Vec<NodeId>,
    pub max_iterations: usize,
    pub parallel: bool,
}

/// Kind-specific fields for a parallel node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelConfig {
    pub branches: Vec<Vec<NodeId>>,
    pub wait_strategy: WaitStrategy,
}

/// Kind-specific fields for a nested-workflow node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRefConfig {
    /// Registry name resolved through `dagforge-registry`.
    pub workflow_ref: String,
    #[serde(default)]
    pub config_overrides: serde_json::Value,
    #[serde(default)]
    pub exposed_outputs: Vec<String>,
}

/// Kind-specific fields for a recursive node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecursiveConfig {
    pub recursive_sources: Vec<NodeId>,
}

/// The per-kind extension of a node. Common fields live on `NodeConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Tool {
        tool_name: String,
        #[serde(default)]
        tool_args: serde_json::Value,
    },
    Llm {
        model: String,
        prompt_template: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
        provider: String,
        #[serde(default)]
        llm_config: serde_json::Value,
    },
    Agent {
        package: String,
        #[serde(default)]
        agent_config: serde_json::Value,
        tools: Vec<String>,
        max_iterations: usize,
        #[serde(default)]
        memory_config: Option<serde_json::Value>,
    },
    Condition(ConditionConfig),
    Loop(LoopConfig),
    Parallel(ParallelConfig),
    Workflow(WorkflowRefConfig),
    Recursive(RecursiveConfig),
    Code {
        language: String,
        #[serde(default)]
        imports: Vec<String>,
        source: String,
    },
    Human {
        prompt: String,
    },
    Monitor {
        target_node_id: NodeId,
    },
    Swarm {
        members: Vec<String>,
    },
}

impl NodeKind {
    /// The lowercase discriminant used in events, fingerprints, and the registry.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Tool { .. } => "tool",
            NodeKind::Llm { .. } => "llm",
            NodeKind::Agent { .. } => "agent",
            NodeKind::Condition(_) => "condition",
            NodeKind::Loop(_) => "loop",
            NodeKind::Parallel(_) => "parallel",
            NodeKind::Workflow(_) => "workflow",
            NodeKind::Recursive(_) => "recursive",
            NodeKind::Code { .. } => "code",
            NodeKind::Human { .. } => "human",
            NodeKind::Monitor { .. } => "monitor",
            NodeKind::Swarm { .. } => "swarm",
        }
    }
}

/// A single node in a blueprint.
///
/// Common fields shared by every node kind; kind-specific fields are nested
/// in `kind`. `level` is derived by `dagforge-graph` and is not part of the
/// authored blueprint (it defaults to `0` until the graph is built).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: NodeId,
    #[serde(default)]
    pub name: Option<String>,
    pub dependencies: Vec<NodeId>,
    #[serde(default)]
    pub level: usize,
    #[serde(default)]
    pub input_mappings: HashMap<String, InputSource>,
    #[serde(default)]
    pub output_mappings: HashMap<String, String>,
    #[serde(default)]
    pub input_schema: IoSchema,
    #[serde(default)]
    pub output_schema: IoSchema,
    #[serde(default)]
    pub use_cache: bool,
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl NodeConfig {
    /// Validate the node-local invariants: no self-dependency, and every
    /// `input_mappings` source must be a declared dependency.
    pub fn validate_local(&self) -> Result<()> {
        if self.dependencies.iter().any(|d| d == &self.id) {
            return Err(DagForgeError::SelfDependency(self.id.clone()));
        }
        for (key, source) in &self.input_mappings {
            if !self.dependencies.contains(&source.source_node_id) {
                return Err(DagForgeError::Validation {
                    message: format!(
                        "input_mappings['{key}'] sources node '{}' which is not in dependencies of '{}'",
                        source.source_node_id, self.id
                    ),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn kind_label(&self) -> &'static str {
        self.kind.label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_node(id: &str, deps: &[&str]) -> NodeConfig {
        NodeConfig {
            id: id.to_string(),
            name: None,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            level: 0,
            input_mappings: HashMap::new(),
            output_mappings: HashMap::new(),
            input_schema: IoSchema::default(),
            output_schema: IoSchema::default(),
            use_cache: false,
            timeout_seconds: None,
            retry: RetryPolicy::default(),
            kind: NodeKind::Tool {
                tool_name: "echo".into(),
                tool_args: serde_json::json!({}),
            },
        }
    }

    #[test]
    fn rejects_self_dependency() {
        let node = tool_node("a", &["a"]);
        assert!(matches!(
            node.validate_local(),
            Err(DagForgeError::SelfDependency(_))
        ));
    }

    #[test]
    fn accepts_valid_mapping() {
        let mut node = tool_node("b", &["a"]);
        node.input_mappings.insert(
            "x".into(),
            InputSource {
                source_node_id: "a".into(),
                source_output_path: "output.x".into(),
            },
        );
        assert!(node.validate_local().is_ok());
    }

    #[test]
    fn rejects_mapping_outside_dependencies() {
        let mut node = tool_node("b", &["a"]);
        node.input_mappings.insert(
            "x".into(),
            InputSource {
                source_node_id: "z".into(),
                source_output_path: "output.x".into(),
            },
        );
        assert!(node.validate_local().is_err());
    }

    #[test]
    fn retry_backoff_doubles() {
        let policy = RetryPolicy {
            retries: 3,
            backoff_seconds: 1.0,
        };
        assert_eq!(policy.delay_for_attempt(1), 1.0);
        assert_eq!(policy.delay_for_attempt(2), 2.0);
        assert_eq!(policy.delay_for_attempt(3), 4.0);
    }

    #[test]
    fn zero_backoff_disables_delay() {
        let policy = RetryPolicy {
            retries: 3,
            backoff_seconds: 0.0,
        };
        assert_eq!(policy.delay_for_attempt(5), 0.0);
    }
}
