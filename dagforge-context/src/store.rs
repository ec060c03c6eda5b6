//! ABOUTME: Unscoped key-value context store backing a single run
//! ABOUTME: `update` enforces the token window; `set` is the unconditional initial write

use dashmap::DashMap;
use dagforge_core::schema::{IoSchema, SchemaType};
use serde_json::Value;

use crate::compression::{compress, CompressionStrategy};
use crate::error::{ContextError, Result};
use crate::token::estimate_tokens;

/// Tunables for a single store instance; one instance backs one run.
#[derive(Debug, Clone, Copy)]
pub struct ContextStoreConfig {
    pub max_tokens: usize,
    pub strategy: CompressionStrategy,
}

impl Default for ContextStoreConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4000,
            strategy: CompressionStrategy::Summarize,
        }
    }
}

/// A run-scoped key-value store. Consistency: single-writer per node
/// execution (each node owns exactly one key, its own `node_id`), so
/// concurrent tasks at the same level never contend on the same key; a
/// lower level's writes are always visible to a higher level's reads
/// because the engine awaits a level's completion before scheduling the
/// next.
#[derive(Debug)]
pub struct ContextStore {
    data: DashMap<String, Value>,
    config: ContextStoreConfig,
}

impl ContextStore {
    #[must_use]
    pub fn new(config: ContextStoreConfig) -> Self {
        Self {
            data: DashMap::new(),
            config,
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.get(key).map(|v| v.clone())
    }

    /// Unconditional write, no compression applied. Used for values that
    /// are never individually token-budgeted on their own — loop/parallel
    /// aggregates assembled from already-stored per-node outputs, and a
    /// run's first seed values before any node has executed.
    pub fn set(&self, key: impl Into<String>, value: Value, schema: Option<&IoSchema>) -> Result<()> {
        let key = key.into();
        if let Some(schema) = schema {
            validate_against_schema(&key, &value, schema)?;
        }
        self.data.insert(key, value);
        Ok(())
    }

    /// Incremental write with token-window enforcement: if the serialized
    /// value exceeds `max_tokens`, the configured compression strategy is
    /// applied before the value is stored.
    pub fn update(
        &self,
        key: impl Into<String>,
        value: Value,
        execution_id: Option<&str>,
        schema: Option<&IoSchema>,
    ) -> Result<()> {
        let key = key.into();
        if let Some(schema) = schema {
            validate_against_schema(&key, &value, schema)?;
        }
        let compressed = compress(&value, self.config.max_tokens, self.config.strategy);
        if let Some(execution_id) = execution_id {
            tracing::debug!(key = %key, execution_id, "context update");
        }
        self.data.insert(key, compressed);
        Ok(())
    }

    /// `clear(None)` wipes the whole store; `clear(Some(key))` removes one entry.
    pub fn clear(&self, key: Option<&str>) {
        match key {
            Some(key) => {
                self.data.remove(key);
            }
            None => self.data.clear(),
        }
    }

    #[must_use]
    pub fn list_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
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

fn validate_against_schema(key: &str, value: &Value, schema: &IoSchema) -> Result<()> {
    let Some(expected) = schema.fields.get(key) else {
        return Ok(());
    };
    let actual = infer_type(value);
    if !actual.unifies_with(expected) {
        return Err(ContextError::SchemaMismatch {
            key: key.to_string(),
            message: format!("expected {expected:?}, got {actual:?}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_then_get_roundtrips() {
        let store = ContextStore::new(ContextStoreConfig::default());
        store.set("n1", json!({"x": 1}), None).unwrap();
        assert_eq!(store.get("n1"), Some(json!({"x": 1})));
    }

    #[test]
    fn get_missing_key_is_none() {
        let store = ContextStore::new(ContextStoreConfig::default());
        assert_eq!(store.get("ghost"), None);
    }

    #[test]
    fn update_compresses_oversized_value() {
        let store = ContextStore::new(ContextStoreConfig {
            max_tokens: 2,
            strategy: CompressionStrategy::Truncate,
        });
        store.update("n1", json!("x".repeat(1000)), None, None).unwrap();
        let stored = store.get("n1").unwrap();
        assert!(stored.as_str().unwrap().contains("[truncated]"));
    }

    #[test]
    fn set_does_not_compress() {
        let store = ContextStore::new(ContextStoreConfig {
            max_tokens: 2,
            strategy: CompressionStrategy::Truncate,
        });
        let big = json!("x".repeat(1000));
        store.set("n1", big.clone(), None).unwrap();
        assert_eq!(store.get("n1"), Some(big));
    }

    #[test]
    fn schema_mismatch_rejected() {
        let store = ContextStore::new(ContextStoreConfig::default());
        let schema = IoSchema::new().with_field("n1", SchemaType::Integer);
        let err = store.set("n1", json!("not an int"), Some(&schema)).unwrap_err();
        assert!(matches!(err, ContextError::SchemaMismatch { .. }));
    }

    #[test]
    fn clear_single_key() {
        let store = ContextStore::new(ContextStoreConfig::default());
        store.set("a", json!(1), None).unwrap();
        store.set("b", json!(2), None).unwrap();
        store.clear(Some("a"));
        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b"), Some(json!(2)));
    }

    #[test]
    fn clear_all() {
        let store = ContextStore::new(ContextStoreConfig::default());
        store.set("a", json!(1), None).unwrap();
        store.clear(None);
        assert!(store.list_keys().is_empty());
    }

    #[test]
    fn list_keys_sorted() {
        let store = ContextStore::new(ContextStoreConfig::default());
        store.set("b", json!(1), None).unwrap();
        store.set("a", json!(2), None).unwrap();
        assert_eq!(store.list_keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn token_estimate_used_for_gate() {
        assert!(estimate_tokens("abcd") > 0);
    }
}
