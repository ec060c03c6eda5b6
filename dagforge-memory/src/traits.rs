//! ABOUTME: Trait hierarchy for the memory system: common ops plus one extension per kind

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::{Guarantee, MemoryEntry, UsageStats};

/// Common operations shared by every memory kind.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Guarantees this instance declares. A `MemoryConfig` may only
    /// request a subset of what the backend actually offers.
    fn guarantees(&self) -> Vec<Guarantee>;

    async fn store(&self, entry: MemoryEntry) -> Result<String>;
    async fn retrieve(&self, key: &str) -> Result<MemoryEntry>;
    async fn search(&self, query: &str, limit: usize, filters: Option<Value>) -> Result<Vec<MemoryEntry>>;
    async fn delete(&self, key: &str) -> Result<()>;
    /// Removes every entry whose key matches `pattern` (a plain substring
    /// match; `None` clears everything).
    async fn clear(&self, pattern: Option<&str>) -> Result<usize>;
    async fn list_keys(&self, pattern: Option<&str>) -> Result<Vec<String>>;
    async fn get_usage_stats(&self) -> Result<UsageStats>;
}

/// An interaction or observation recorded verbatim, with enough indexing
/// metadata (type, participant, tag, date, outcome) to support history
/// retrieval and basic pattern analytics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicRecord {
    pub entry: MemoryEntry,
    pub event_type: String,
    pub participant: Option<String>,
    pub tags: Vec<String>,
    pub outcome: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[async_trait]
pub trait EpisodicMemory: MemoryBackend {
    async fn record(&self, record: EpisodicRecord) -> Result<String>;
    async fn history(
        &self,
        participant: Option<&str>,
        tag: Option<&str>,
        outcome: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<EpisodicRecord>>;
    /// Frequency count of each distinct `outcome` observed, for lightweight
    /// pattern analytics over the episode history.
    async fn outcome_frequencies(&self) -> Result<Vec<(String, u64)>>;
}

/// A domain entity in semantic memory's fact graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub entity_type: String,
    pub name: String,
    pub properties: Value,
}

/// A directed, typed edge between two entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub from_entity: String,
    pub to_entity: String,
    pub relationship_type: String,
    pub properties: Value,
}

#[async_trait]
pub trait SemanticMemory: MemoryBackend {
    async fn upsert_entity(&self, entity: Entity, embedding: Option<Vec<f32>>) -> Result<()>;
    async fn get_entity(&self, id: &str) -> Result<Entity>;
    async fn upsert_relationship(&self, relationship: Relationship) -> Result<()>;
    async fn relationships_of(&self, entity_id: &str) -> Result<Vec<Relationship>>;
    /// Vector similarity search; errors with `DimensionMismatch` if
    /// `query_embedding`'s length doesn't match the index's `embedding_dim`.
    async fn vector_search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<Entity>>;
}

/// A learned action pattern tracked by procedural memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPattern {
    pub id: String,
    pub description: String,
    pub steps: Vec<String>,
    pub success_rate: f64,
    pub usage_count: u64,
    /// Conditions under which this pattern is considered applicable,
    /// matched structurally against a caller-supplied context object.
    pub applicability_filters: Value,
}

#[async_trait]
pub trait ProceduralMemory: MemoryBackend {
    async fn store_pattern(&self, pattern: ActionPattern) -> Result<String>;
    /// Patterns whose `applicability_filters` are satisfied by `context`,
    /// ranked by `success_rate` descending.
    async fn applicable_patterns(&self, context: &Value) -> Result<Vec<ActionPattern>>;
    /// Records one execution outcome, updating `success_rate`/`usage_count`.
    async fn record_outcome(&self, pattern_id: &str, succeeded: bool) -> Result<()>;
    /// Composes a named sequence of existing pattern ids into a new one.
    async fn compose(&self, id: &str, description: &str, pattern_ids: &[String]) -> Result<ActionPattern>;
}
