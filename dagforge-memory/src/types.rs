//! ABOUTME: Shared value types for every memory kind

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A guarantee a memory backend declares, and that a `MemoryConfig` requests.
///
/// A config's requested guarantee must be a *subset* of the backend's
/// declared guarantees, never the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guarantee {
    /// In-process only, lost on restart.
    Ephemeral,
    /// Entries expire after a declared TTL.
    Ttl,
    /// Survives process restart (backend-dependent: sqlite, kv-store, etc).
    Durable,
    /// Backed by a vector index with a fixed `embedding_dim`.
    Vectorised,
}

/// A single stored item, common across working/episodic/semantic/procedural.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    #[serde(default = "generate_id")]
    pub key: String,
    pub content: Value,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub access_count: u64,
    /// Caller-assigned relevance, 0 (disposable) to 10 (critical).
    #[serde(default)]
    pub importance: u8,
    #[serde(default)]
    pub token_usage: u64,
    #[serde(default)]
    pub cost_usd: f64,
}

impl MemoryEntry {
    #[must_use]
    pub fn new(content: Value) -> Self {
        Self {
            key: generate_id(),
            content,
            metadata: Value::Null,
            timestamp: Utc::now(),
            access_count: 0,
            importance: 5,
            token_usage: 0,
            cost_usd: 0.0,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    #[must_use]
    pub fn with_importance(mut self, importance: u8) -> Self {
        self.importance = importance.min(10);
        self
    }
}

/// Aggregate accounting returned by `get_usage_stats`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageStats {
    pub entry_count: usize,
    pub total_token_usage: u64,
    pub total_cost_usd: f64,
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_is_clamped_to_ten() {
        let entry = MemoryEntry::new(Value::Null).with_importance(200);
        assert_eq!(entry.importance, 10);
    }
}
