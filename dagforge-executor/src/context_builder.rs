//! ABOUTME: Resolves a node's `input_mappings` against the context store into its executor inputs
//! ABOUTME: Session metadata is the base; explicit mappings win on key conflict

use dagforge_context::ScopedContextStore;
use dagforge_core::node::NodeConfig;
use serde_json::{Map, Value};

/// Walk a dotted path (`"output.x.y"`) into a JSON value, returning `None`
/// if any segment is missing or the value isn't an object at that point.
fn resolve_dotted(value: &Value, path: &str) -> Option<Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current.clone())
}

/// Build the input map for `node`: start from `session_metadata`, then
/// overlay each `input_mappings` entry resolved against upstream outputs
/// in the context store. Mappings always win over same-named metadata.
#[must_use]
pub fn build_inputs(
    node: &NodeConfig,
    context: &ScopedContextStore,
    session_metadata: &Value,
) -> Value {
    let mut inputs: Map<String, Value> = session_metadata
        .as_object()
        .cloned()
        .unwrap_or_default();

    for (field, source) in &node.input_mappings {
        let Some(upstream_output) = context.get(&source.source_node_id) else {
            continue;
        };
        if let Some(resolved) = resolve_dotted(&upstream_output, &source.source_output_path) {
            inputs.insert(field.clone(), resolved);
        }
    }

    Value::Object(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagforge_context::ContextStoreConfig;
    use dagforge_core::node::{InputSource, NodeKind, RetryPolicy};
    use dagforge_core::schema::IoSchema;
    use serde_json::json;
    use std::collections::HashMap;

    fn node_with_mapping(field: &str, source_node: &str, path: &str) -> NodeConfig {
        let mut mappings = HashMap::new();
        mappings.insert(
            field.to_string(),
            InputSource {
                source_node_id: source_node.to_string(),
                source_output_path: path.to_string(),
            },
        );
        NodeConfig {
            id: "consumer".into(),
            name: None,
            dependencies: vec![source_node.to_string()],
            level: 1,
            input_mappings: mappings,
            output_mappings: HashMap::new(),
            input_schema: IoSchema::default(),
            output_schema: IoSchema::default(),
            use_cache: false,
            timeout_seconds: None,
            retry: RetryPolicy::default(),
            kind: NodeKind::Tool {
                tool_name: "echo".into(),
                tool_args: json!({}),
            },
        }
    }

    #[test]
    fn mapping_resolves_nested_path() {
        let store = ScopedContextStore::new("s", ContextStoreConfig::default());
        store.set("producer", json!({"output": {"x": 42}}), None).unwrap();
        let node = node_with_mapping("value", "producer", "output.x");
        let inputs = build_inputs(&node, &store, &json!({}));
        assert_eq!(inputs["value"], json!(42));
    }

    #[test]
    fn explicit_mapping_overrides_session_metadata() {
        let store = ScopedContextStore::new("s", ContextStoreConfig::default());
        store.set("producer", json!({"output": {"value": "mapped"}}), None).unwrap();
        let node = node_with_mapping("value", "producer", "output.value");
        let inputs = build_inputs(&node, &store, &json!({"value": "from-metadata"}));
        assert_eq!(inputs["value"], json!("mapped"));
    }

    #[test]
    fn missing_upstream_output_is_skipped() {
        let store = ScopedContextStore::new("s", ContextStoreConfig::default());
        let node = node_with_mapping("value", "producer", "output.x");
        let inputs = build_inputs(&node, &store, &json!({"other": 1}));
        assert!(inputs.get("value").is_none());
        assert_eq!(inputs["other"], json!(1));
    }
}
