//! ABOUTME: Tenant/session-scoped facade over `ContextStore`
//! ABOUTME: Tenant/session-prefixed view over the store; the engine never sees scope prefixes

use dagforge_core::schema::IoSchema;
use serde_json::Value;

use crate::error::Result;
use crate::store::{ContextStore, ContextStoreConfig};

/// Wraps a `ContextStore` so every key is namespaced by `scope`
/// (typically `"{tenant}:{session_id}"`) without the caller ever
/// constructing the prefix itself.
#[derive(Debug)]
pub struct ScopedContextStore {
    scope: String,
    inner: ContextStore,
}

impl ScopedContextStore {
    #[must_use]
    pub fn new(scope: impl Into<String>, config: ContextStoreConfig) -> Self {
        Self {
            scope: scope.into(),
            inner: ContextStore::new(config),
        }
    }

    fn key(&self, node_id: &str) -> String {
        format!("{}:{node_id}", self.scope)
    }

    #[must_use]
    pub fn get(&self, node_id: &str) -> Option<Value> {
        self.inner.get(&self.key(node_id))
    }

    pub fn set(&self, node_id: &str, value: Value, schema: Option<&IoSchema>) -> Result<()> {
        self.inner.set(self.key(node_id), value, schema)
    }

    pub fn update(
        &self,
        node_id: &str,
        value: Value,
        execution_id: Option<&str>,
        schema: Option<&IoSchema>,
    ) -> Result<()> {
        self.inner.update(self.key(node_id), value, execution_id, schema)
    }

    pub fn clear(&self, node_id: Option<&str>) {
        match node_id {
            Some(node_id) => self.inner.clear(Some(&self.key(node_id))),
            None => self.inner.clear(None),
        }
    }

    /// Node ids currently populated, with the scope prefix stripped back off.
    #[must_use]
    pub fn node_ids(&self) -> Vec<String> {
        let prefix = format!("{}:", self.scope);
        self.inner
            .list_keys()
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_scoped_and_isolated() {
        let a = ScopedContextStore::new("tenant-a:session-1", ContextStoreConfig::default());
        let b = ScopedContextStore::new("tenant-b:session-1", ContextStoreConfig::default());
        a.set("n1", json!(1), None).unwrap();
        b.set("n1", json!(2), None).unwrap();
        assert_eq!(a.get("n1"), Some(json!(1)));
        assert_eq!(b.get("n1"), Some(json!(2)));
    }

    #[test]
    fn node_ids_strip_scope_prefix() {
        let store = ScopedContextStore::new("tenant-a:session-1", ContextStoreConfig::default());
        store.set("n1", json!(1), None).unwrap();
        store.set("n2", json!(2), None).unwrap();
        assert_eq!(store.node_ids(), vec!["n1".to_string(), "n2".to_string()]);
    }

    #[test]
    fn clear_one_node_leaves_others() {
        let store = ScopedContextStore::new("s", ContextStoreConfig::default());
        store.set("n1", json!(1), None).unwrap();
        store.set("n2", json!(2), None).unwrap();
        store.clear(Some("n1"));
        assert_eq!(store.get("n1"), None);
        assert_eq!(store.get("n2"), Some(json!(2)));
    }
}
