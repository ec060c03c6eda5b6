//! ABOUTME: Patch application — add/update/remove nodes by id

use dagforge_core::node::NodeConfig;

/// A patch entry for `PatchBlueprint`: either a node body to add/update, or
/// the `__delete__` sentinel removing `id`.
#[derive(Debug, Clone)]
pub enum NodePatch {
    Upsert(NodeConfig),
    Delete { id: String },
}

const DELETE_SENTINEL: &str = "__delete__";

impl NodePatch {
    /// Parses a single element of the `PatchBlueprint` request body's
    /// `nodes` array. A patch entry is a delete when its JSON carries
    /// `"type": "__delete__"` alongside `id`; otherwise it is parsed as a
    /// full `NodeConfig` to add or replace.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.get("type").and_then(serde_json::Value::as_str) == Some(DELETE_SENTINEL) {
            let id = value
                .get("id")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(NodePatch::Delete { id })
        } else {
            let node: NodeConfig = serde_json::from_value(value)?;
            Ok(NodePatch::Upsert(node))
        }
    }
}

/// Applies `patches` to `nodes` in order: an `Upsert` replaces the node
/// sharing its id or appends if no such node exists; a `Delete` removes
/// the node with that id.
pub fn apply_patches(nodes: &mut Vec<NodeConfig>, patches: Vec<NodePatch>) {
    for patch in patches {
        match patch {
            NodePatch::Upsert(node) => {
                if let Some(existing) = nodes.iter_mut().find(|n| n.id == node.id) {
                    *existing = node;
                } else {
                    nodes.push(node);
                }
            }
            NodePatch::Delete { id } => {
                nodes.retain(|n| n.id != id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagforge_core::node::{NodeKind, RetryPolicy};
    use dagforge_core::schema::IoSchema;
    use std::collections::HashMap;

    fn tool_node(id: &str) -> NodeConfig {
        NodeConfig {
            id: id.to_string(),
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
            kind: NodeKind::Tool {
                tool_name: "echo".into(),
                tool_args: serde_json::json!({}),
            },
        }
    }

    #[test]
    fn upsert_replaces_existing_node() {
        let mut nodes = vec![tool_node("a")];
        let mut replacement = tool_node("a");
        replacement.use_cache = true;
        apply_patches(&mut nodes, vec![NodePatch::Upsert(replacement)]);
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].use_cache);
    }

    #[test]
    fn upsert_appends_new_node() {
        let mut nodes = vec![tool_node("a")];
        apply_patches(&mut nodes, vec![NodePatch::Upsert(tool_node("b"))]);
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn delete_removes_matching_node() {
        let mut nodes = vec![tool_node("a"), tool_node("b")];
        apply_patches(&mut nodes, vec![NodePatch::Delete { id: "a".into() }]);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, "b");
    }

    #[test]
    fn parses_delete_sentinel_from_json() {
        let value = serde_json::json!({"id": "a", "type": "__delete__"});
        let patch = NodePatch::from_value(value).unwrap();
        assert!(matches!(patch, NodePatch::Delete { id } if id == "a"));
    }
}
