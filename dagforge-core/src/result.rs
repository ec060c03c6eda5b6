//! ABOUTME: NodeExecutionResult and its supporting metadata/usage types
//! ABOUTME: The common return shape every executor and the engine itself produce

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tagged error classification surfaced on a failed execution result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Runtime,
    Timeout,
    DepthExceeded,
    TokenBudget,
    Cancelled,
    Upstream,
}

impl ErrorKind {
    /// Whether the executor dispatch layer should retry on this class.
    ///
    /// `Upstream` counts as retriable: it's how a human node's unresolved
    /// wait and similar externally-gated states reuse the node's own
    /// `RetryPolicy` backoff loop as their poll interval instead of a
    /// bespoke wait primitive.
    #[must_use]
    pub const fn is_retriable(self) -> bool {
        matches!(self, ErrorKind::Runtime | ErrorKind::Timeout | ErrorKind::Upstream)
    }
}

/// Token/cost usage reported by an LLM or agent node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_usd: f64,
    pub model: Option<String>,
    pub provider: Option<String>,
}

impl Usage {
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.tokens_in + self.tokens_out
    }
}

/// Per-node execution bookkeeping attached to every result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub node_id: String,
    pub kind: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub retries_used: u32,
    pub error_type: Option<ErrorKind>,
}

impl NodeMetadata {
    #[must_use]
    pub fn new(node_id: impl Into<String>, kind: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            node_id: node_id.into(),
            kind: kind.into(),
            start_time: now,
            end_time: now,
            duration_ms: 0,
            retries_used: 0,
            error_type: None,
        }
    }

    /// Stamp `end_time` and derive `duration_ms` from `start_time`.
    pub fn finish(&mut self) {
        self.end_time = Utc::now();
        self.duration_ms = (self.end_time - self.start_time).num_milliseconds();
    }
}

/// The uniform result shape returned by every node kind's executor and by
/// the workflow engine itself (a workflow node's own execution also
/// produces a `NodeExecutionResult`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionResult {
    pub success: bool,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    pub metadata: NodeMetadata,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub context_used: Option<Value>,
    #[serde(default)]
    pub cache_hit: bool,
}

impl NodeExecutionResult {
    #[must_use]
    pub fn success(node_id: impl Into<String>, kind: impl Into<String>, output: Value) -> Self {
        let mut metadata = NodeMetadata::new(node_id, kind);
        metadata.finish();
        Self {
            success: true,
            output: Some(output),
            error: None,
            metadata,
            usage: None,
            context_used: None,
            cache_hit: false,
        }
    }

    #[must_use]
    pub fn failure(
        node_id: impl Into<String>,
        kind: impl Into<String>,
        error: impl Into<String>,
        error_type: ErrorKind,
    ) -> Self {
        let mut metadata = NodeMetadata::new(node_id, kind);
        metadata.error_type = Some(error_type);
        metadata.finish();
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            metadata,
            usage: None,
            context_used: None,
            cache_hit: false,
        }
    }

    #[must_use]
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    #[must_use]
    pub fn with_cache_hit(mut self, hit: bool) -> Self {
        self.cache_hit = hit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retriable_classes() {
        assert!(ErrorKind::Runtime.is_retriable());
        assert!(ErrorKind::Timeout.is_retriable());
        assert!(ErrorKind::Upstream.is_retriable());
        assert!(!ErrorKind::Validation.is_retriable());
        assert!(!ErrorKind::Cancelled.is_retriable());
        assert!(!ErrorKind::TokenBudget.is_retriable());
    }

    #[test]
    fn success_result_has_no_error() {
        let result = NodeExecutionResult::success("a", "tool", serde_json::json!({"x": 1}));
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.output, Some(serde_json::json!({"x": 1})));
    }

    #[test]
    fn failure_result_carries_error_type() {
        let result = NodeExecutionResult::failure("a", "tool", "boom", ErrorKind::Timeout);
        assert!(!result.success);
        assert_eq!(result.metadata.error_type, Some(ErrorKind::Timeout));
    }

    #[test]
    fn usage_totals_sum_in_and_out() {
        let usage = Usage {
            tokens_in: 10,
            tokens_out: 5,
            ..Default::default()
        };
        assert_eq!(usage.total_tokens(), 15);
    }
}
