//! ABOUTME: Schema alignment check between an edge's producer output schema and consumer input mapping
//! ABOUTME: Non-fatal warnings unless strict=true

use dagforge_core::schema::SchemaType;

use crate::graph::DependencyGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct SchemaAlignmentIssue {
    pub node_id: String,
    pub field: String,
    pub source_node_id: String,
    pub source_path: String,
    pub message: String,
    pub severity: Severity,
}

/// Walk every node's `input_mappings` and verify the referenced path
/// resolves on the source node's `output_schema` to a type assignable to
/// the consumer's declared `input_schema[field]`.
///
/// When `strict` is `false`, every misalignment is downgraded to a
/// warning (non-fatal); the caller is expected to log warnings and only
/// treat `Severity::Error` entries as blockers.
#[must_use]
pub fn check_schema_alignment(graph: &DependencyGraph, strict: bool) -> Vec<SchemaAlignmentIssue> {
    let mut issues = Vec::new();

    for node_id in {
        let mut ids: Vec<_> = graph.node_ids().cloned().collect();
        ids.sort();
        ids
    } {
        let Some(node) = graph.node(&node_id) else {
            continue;
        };
        for (field, source) in &node.input_mappings {
            let Some(producer) = graph.node(&source.source_node_id) else {
                continue; // missing-dependency is caught at build time already
            };
            let resolved = producer
                .output_schema
                .resolve_path(&source.source_output_path)
                .unwrap_or(SchemaType::Any);
            let declared = node
                .input_schema
                .fields
                .get(field)
                .cloned()
                .unwrap_or(SchemaType::Any);

            if !resolved.unifies_with(&declared) {
                issues.push(SchemaAlignmentIssue {
                    node_id: node_id.clone(),
                    field: field.clone(),
                    source_node_id: source.source_node_id.clone(),
                    source_path: source.source_output_path.clone(),
                    message: format!(
                        "'{}' expects {field} as {declared:?} but '{}' produces {resolved:?} at '{}'",
                        node_id, source.source_node_id, source.source_output_path
                    ),
                    severity: if strict {
                        Severity::Error
                    } else {
                        Severity::Warning
                    },
                });
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagforge_core::node::{InputSource, NodeConfig, NodeKind, RetryPolicy};
    use dagforge_core::schema::IoSchema;
    use std::collections::HashMap;

    fn node(
        id: &str,
        deps: &[&str],
        input_mappings: HashMap<String, InputSource>,
        input_schema: IoSchema,
        output_schema: IoSchema,
    ) -> NodeConfig {
        NodeConfig {
            id: id.to_string(),
            name: None,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            level: 0,
            input_mappings,
            output_mappings: HashMap::new(),
            input_schema,
            output_schema,
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
    fn mismatched_types_flagged_as_warning_by_default() {
        let producer = node(
            "A",
            &[],
            HashMap::new(),
            IoSchema::new(),
            IoSchema::new().with_field("x", SchemaType::String),
        );
        let mut mappings = HashMap::new();
        mappings.insert(
            "value".to_string(),
            InputSource {
                source_node_id: "A".into(),
                source_output_path: "x".into(),
            },
        );
        let consumer = node(
            "B",
            &["A"],
            mappings,
            IoSchema::new().with_field("value", SchemaType::Integer),
            IoSchema::new(),
        );
        let graph = DependencyGraph::build(vec![producer, consumer]).unwrap();
        let issues = check_schema_alignment(&graph, false);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
    }

    #[test]
    fn strict_mode_escalates_to_error() {
        let producer = node(
            "A",
            &[],
            HashMap::new(),
            IoSchema::new(),
            IoSchema::new().with_field("x", SchemaType::String),
        );
        let mut mappings = HashMap::new();
        mappings.insert(
            "value".to_string(),
            InputSource {
                source_node_id: "A".into(),
                source_output_path: "x".into(),
            },
        );
        let consumer = node(
            "B",
            &["A"],
            mappings,
            IoSchema::new().with_field("value", SchemaType::Integer),
            IoSchema::new(),
        );
        let graph = DependencyGraph::build(vec![producer, consumer]).unwrap();
        let issues = check_schema_alignment(&graph, true);
        assert_eq!(issues[0].severity, Severity::Error);
    }

    #[test]
    fn any_never_flagged() {
        let producer = node("A", &[], HashMap::new(), IoSchema::new(), IoSchema::new());
        let mut mappings = HashMap::new();
        mappings.insert(
            "value".to_string(),
            InputSource {
                source_node_id: "A".into(),
                source_output_path: "x".into(),
            },
        );
        let consumer = node(
            "B",
            &["A"],
            mappings,
            IoSchema::new().with_field("value", SchemaType::Integer),
            IoSchema::new(),
        );
        let graph = DependencyGraph::build(vec![producer, consumer]).unwrap();
        assert!(check_schema_alignment(&graph, true).is_empty());
    }
}
