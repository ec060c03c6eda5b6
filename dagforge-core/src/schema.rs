//! ABOUTME: Typed IO schema and the permissive unification rule used for schema alignment
//! ABOUTME: Backs the dependency graph's edge schema-alignment check

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A minimal structural type used for schema-alignment checks.
///
/// This intentionally stops short of a full JSON-schema implementation —
/// only "type-only" validation and a permissive unification rule (`any ⇝
/// T`, `dict ⇝ dict`, primitives by name) are needed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaType {
    Any,
    String,
    Integer,
    Number,
    Boolean,
    Dict,
    Array(Box<SchemaType>),
}

impl SchemaType {
    /// Permissive assignability check: can a value typed `self` flow into
    /// a slot typed `target`?
    #[must_use]
    pub fn unifies_with(&self, target: &SchemaType) -> bool {
        match (self, target) {
            (SchemaType::Any, _) | (_, SchemaType::Any) => true,
            (SchemaType::Dict, SchemaType::Dict) => true,
            (SchemaType::Array(a), SchemaType::Array(b)) => a.unifies_with(b),
            (a, b) => a == b,
        }
    }
}

/// A node's input or output schema: a map of field name to type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IoSchema {
    pub fields: HashMap<String, SchemaType>,
}

impl IoSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, ty: SchemaType) -> Self {
        self.fields.insert(name.into(), ty);
        self
    }

    /// Resolve a dotted path's leaf field type, if declared.
    ///
    /// Only the first path segment is looked up against `fields`; deeper
    /// segments resolve to `SchemaType::Any` since the schema model here
    /// is shallow by design: type-only validation, not full JSON-schema
    /// resolution.
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> Option<SchemaType> {
        let head = path.split('.').next()?;
        self.fields.get(head).cloned()
    }
}
