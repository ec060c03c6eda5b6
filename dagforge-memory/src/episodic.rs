//! ABOUTME: Episodic memory — durable, indexed history with basic pattern analytics

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{MemoryError, Result};
use crate::traits::{EpisodicMemory, EpisodicRecord, MemoryBackend};
use crate::types::{Guarantee, MemoryEntry, UsageStats};

/// Durable-in-process episodic store: indexed by participant/tag/outcome
/// for retrieval, independent of insertion order.
pub struct InMemoryEpisodicMemory {
    records: DashMap<String, EpisodicRecord>,
    order: RwLock<Vec<String>>,
}

impl InMemoryEpisodicMemory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            order: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryEpisodicMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MemoryBackend for InMemoryEpisodicMemory {
    fn guarantees(&self) -> Vec<Guarantee> {
        vec![Guarantee::Durable]
    }

    async fn store(&self, entry: MemoryEntry) -> Result<String> {
        self.record(EpisodicRecord {
            entry,
            event_type: "generic".into(),
            participant: None,
            tags: Vec::new(),
            outcome: None,
            occurred_at: Utc::now(),
        })
        .await
    }

    async fn retrieve(&self, key: &str) -> Result<MemoryEntry> {
        self.records
            .get(key)
            .map(|r| r.entry.clone())
            .ok_or_else(|| MemoryError::NotFound(key.to_string()))
    }

    async fn search(&self, query: &str, limit: usize, _filters: Option<Value>) -> Result<Vec<MemoryEntry>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.entry.content.to_string().contains(query))
            .take(limit)
            .map(|r| r.entry.clone())
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.records.remove(key);
        self.order.write().retain(|k| k != key);
        Ok(())
    }

    async fn clear(&self, pattern: Option<&str>) -> Result<usize> {
        let doomed: Vec<String> = match pattern {
            None => self.records.iter().map(|r| r.key().clone()).collect(),
            Some(p) => self.records.iter().filter(|r| r.key().contains(p)).map(|r| r.key().clone()).collect(),
        };
        for key in &doomed {
            self.records.remove(key);
        }
        self.order.write().retain(|k| !doomed.contains(k));
        Ok(doomed.len())
    }

    async fn list_keys(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        Ok(self
            .records
            .iter()
            .map(|r| r.key().clone())
            .filter(|k| pattern.map_or(true, |p| k.contains(p)))
            .collect())
    }

    async fn get_usage_stats(&self) -> Result<UsageStats> {
        let mut stats = UsageStats::default();
        for r in self.records.iter() {
            stats.entry_count += 1;
            stats.total_token_usage += r.entry.token_usage;
            stats.total_cost_usd += r.entry.cost_usd;
        }
        Ok(stats)
    }
}

#[async_trait::async_trait]
impl EpisodicMemory for InMemoryEpisodicMemory {
    async fn record(&self, record: EpisodicRecord) -> Result<String> {
        let key = record.entry.key.clone();
        self.records.insert(key.clone(), record);
        self.order.write().push(key.clone());
        Ok(key)
    }

    async fn history(
        &self,
        participant: Option<&str>,
        tag: Option<&str>,
        outcome: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<EpisodicRecord>> {
        let order = self.order.read();
        Ok(order
            .iter()
            .filter_map(|key| self.records.get(key).map(|r| r.clone()))
            .filter(|r| participant.map_or(true, |p| r.participant.as_deref() == Some(p)))
            .filter(|r| tag.map_or(true, |t| r.tags.iter().any(|rt| rt == t)))
            .filter(|r| outcome.map_or(true, |o| r.outcome.as_deref() == Some(o)))
            .filter(|r| since.map_or(true, |s| r.occurred_at >= s))
            .collect())
    }

    async fn outcome_frequencies(&self) -> Result<Vec<(String, u64)>> {
        let mut counts: std::collections::HashMap<String, u64> = std::collections::HashMap::new();
        for r in self.records.iter() {
            if let Some(outcome) = &r.outcome {
                *counts.entry(outcome.clone()).or_insert(0) += 1;
            }
        }
        let mut frequencies: Vec<(String, u64)> = counts.into_iter().collect();
        frequencies.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(frequencies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(participant: &str, outcome: &str) -> EpisodicRecord {
        EpisodicRecord {
            entry: MemoryEntry::new(json!({"note": "did a thing"})),
            event_type: "tool_call".into(),
            participant: Some(participant.into()),
            tags: vec!["demo".into()],
            outcome: Some(outcome.into()),
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn history_filters_by_participant_and_outcome() {
        let memory = InMemoryEpisodicMemory::new();
        memory.record(record("alice", "success")).await.unwrap();
        memory.record(record("bob", "failure")).await.unwrap();

        let alice_history = memory.history(Some("alice"), None, None, None).await.unwrap();
        assert_eq!(alice_history.len(), 1);

        let failures = memory.history(None, None, Some("failure"), None).await.unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].participant.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn outcome_frequencies_counts_and_sorts_descending() {
        let memory = InMemoryEpisodicMemory::new();
        memory.record(record("a", "success")).await.unwrap();
        memory.record(record("b", "success")).await.unwrap();
        memory.record(record("c", "failure")).await.unwrap();

        let frequencies = memory.outcome_frequencies().await.unwrap();
        assert_eq!(frequencies[0], ("success".to_string(), 2));
    }
}
