//! ABOUTME: The per-node dispatch contract: cache check, schema validation, timeout/retry, usage recording
//! ABOUTME: Cache check, schema validation, timeout/retry, usage recording; kind routing is a plain map from label to `NodeExecutor`

use std::collections::HashMap;
use std::sync::Arc;

use dagforge_context::ScopedContextStore;
use dagforge_core::node::NodeConfig;
use dagforge_core::result::{NodeExecutionResult, Usage};
use dagforge_core::schema::{IoSchema, SchemaType};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::cache::{fingerprint, ExecutionCache};
use crate::context_builder::build_inputs;
use crate::error::{ExecutorError, Result};
use crate::retry::{with_retry, with_timeout};

/// What a kind-specific executor produces: the node's output plus usage,
/// if the kind reports any (tool/condition/etc. report none).
#[derive(Debug, Clone, Default)]
pub struct ExecutorOutput {
    pub value: Value,
    pub usage: Option<Usage>,
}

impl ExecutorOutput {
    #[must_use]
    pub fn value(value: Value) -> Self {
        Self { value, usage: None }
    }
}

/// Canonical per-kind executor signature.
#[async_trait::async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn invoke(&self, node: &NodeConfig, inputs: Value) -> Result<ExecutorOutput>;
}

/// Maps a node kind label (`NodeKind::label()`) to its executor.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<&'static str, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: &'static str, executor: Arc<dyn NodeExecutor>) {
        self.executors.insert(kind, executor);
    }

    #[must_use]
    pub fn get(&self, kind: &str) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(kind).cloned()
    }
}

fn infer_type(value: &Value) -> SchemaType {
    match value {
        Value::Null => SchemaType::Any,
        Value::Bool(_) => SchemaType::Boolean,
        Value::Number(n) if n.is_i64() || n.is_u64() => SchemaType::Integer,
        Value::Number(_) => SchemaType::Number,
        Value::String(_) => SchemaType::String,
        Value::Array(items) => {
            let inner = items.first().map_or(SchemaType::Any, infer_type);
            SchemaType::Array(Box::new(inner))
        }
        Value::Object(_) => SchemaType::Dict,
    }
}

/// Type-only validation against a declared `IoSchema`; unset fields and
/// `Any`-typed fields are permissive. Returns every mismatch found.
fn validate(value: &Value, schema: &IoSchema) -> std::result::Result<(), Vec<String>> {
    let Some(obj) = value.as_object() else {
        return Ok(());
    };
    let mut errors = Vec::new();
    for (field, expected) in &schema.fields {
        if let Some(actual_value) = obj.get(field) {
            let actual = infer_type(actual_value);
            if !actual.unifies_with(expected) {
                errors.push(format!("field '{field}': expected {expected:?}, got {actual:?}"));
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Runs the full dispatch contract for a single node.
pub struct Dispatcher {
    registry: ExecutorRegistry,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: ExecutorRegistry) -> Self {
        Self { registry }
    }

    #[instrument(skip(self, context, cache, session_metadata), fields(node_id = %node.id, kind = node.kind_label()))]
    pub async fn execute(
        &self,
        node: &NodeConfig,
        context: &ScopedContextStore,
        session_metadata: &Value,
        cache: &ExecutionCache,
    ) -> NodeExecutionResult {
        let kind = node.kind_label();
        let inputs = build_inputs(node, context, session_metadata);

        if node.use_cache {
            let key = fingerprint(node, &inputs);
            if let Some(mut cached) = cache.get(&key) {
                debug!(node_id = %node.id, "cache hit");
                cached.cache_hit = true;
                return cached;
            }
        }

        let result = self.execute_uncached(node, kind, inputs.clone()).await;

        if node.use_cache {
            let key = fingerprint(node, &inputs);
            cache.put(key, result.clone());
        }

        if result.success {
            if let Some(output) = &result.output {
                if let Err(e) = context.update(&node.id, output.clone(), None, Some(&node.output_schema)) {
                    warn!(node_id = %node.id, error = %e, "failed to persist output to context");
                }
            }
        }

        result
    }

    async fn execute_uncached(&self, node: &NodeConfig, kind: &'static str, inputs: Value) -> NodeExecutionResult {
        if let Err(errors) = validate(&inputs, &node.input_schema) {
            let message = errors.join("; ");
            return NodeExecutionResult::failure(&node.id, kind, message, dagforge_core::result::ErrorKind::Validation);
        }

        let Some(executor) = self.registry.get(kind) else {
            return NodeExecutionResult::failure(
                &node.id,
                kind,
                ExecutorError::NoExecutorForKind(kind.to_string()).to_string(),
                dagforge_core::result::ErrorKind::Runtime,
            );
        };

        let policy = node.retry;
        let timeout_seconds = node.timeout_seconds;
        let (outcome, retries_used) = with_retry(&policy, |_attempt| {
            let executor = executor.clone();
            let node = node.clone();
            let inputs = inputs.clone();
            async move { with_timeout(timeout_seconds, executor.invoke(&node, inputs)).await }
        })
        .await;

        match outcome {
            Ok(output) => {
                if let Err(errors) = validate(&output.value, &node.output_schema) {
                    let mut result = NodeExecutionResult::failure(
                        &node.id,
                        kind,
                        errors.join("; "),
                        dagforge_core::result::ErrorKind::Validation,
                    );
                    result.metadata.retries_used = retries_used;
                    return result;
                }
                let mut result = NodeExecutionResult::success(&node.id, kind, output.value);
                result.metadata.retries_used = retries_used;
                if let Some(usage) = output.usage {
                    result = result.with_usage(usage);
                }
                result
            }
            Err(err) => {
                let mut result = NodeExecutionResult::failure(&node.id, kind, err.to_string(), err.kind());
                result.metadata.retries_used = retries_used;
                result
            }
        }
    }
}
