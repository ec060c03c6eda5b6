//! ABOUTME: Cache-by-fingerprint for nodes with `use_cache = true`
//! ABOUTME: fingerprint = sha256(node_cfg ⊕ canonicalized inputs)

use dagforge_core::node::NodeConfig;
use dagforge_core::result::NodeExecutionResult;
use dashmap::DashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Canonicalize a JSON value deterministically (object keys sorted) so the
/// fingerprint is stable regardless of construction order. Shares the
/// algorithm used by `dagforge-core::blueprint::compute_lock`.
fn canonicalize(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{:?}:{}", k, canonicalize(&map[k])))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", parts.join(","))
        }
        other => other.to_string(),
    }
}

/// Compute the cache fingerprint for a node invocation.
#[must_use]
pub fn fingerprint(node: &NodeConfig, inputs: &Value) -> String {
    let node_repr = serde_json::to_value(node).unwrap_or(Value::Null);
    let combined = format!("{}|{}", canonicalize(&node_repr), canonicalize(inputs));
    let digest = Sha256::digest(combined.as_bytes());
    hex::encode(digest)
}

/// In-memory fingerprint cache. Process-wide: callers share one instance
/// across runs rather than allocating fresh per `execute()`, so a repeated
/// blueprint can hit on its second run.
#[derive(Debug, Default)]
pub struct ExecutionCache {
    entries: DashMap<String, NodeExecutionResult>,
}

impl ExecutionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<NodeExecutionResult> {
        self.entries.get(key).map(|v| v.clone())
    }

    pub fn put(&self, key: String, result: NodeExecutionResult) {
        self.entries.insert(key, result);
    }
}
