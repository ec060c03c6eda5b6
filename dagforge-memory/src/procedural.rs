//! ABOUTME: Procedural memory — learned action patterns with success-rate tracking

use dashmap::DashMap;
use serde_json::Value;

use crate::error::{MemoryError, Result};
use crate::traits::{ActionPattern, MemoryBackend, ProceduralMemory};
use crate::types::{Guarantee, MemoryEntry, UsageStats};

pub struct InMemoryProceduralMemory {
    patterns: DashMap<String, ActionPattern>,
}

impl InMemoryProceduralMemory {
    #[must_use]
    pub fn new() -> Self {
        Self { patterns: DashMap::new() }
    }

    /// A pattern is applicable when every key/value pair in its
    /// `applicability_filters` object matches the corresponding field in
    /// `context`; an empty filter set is applicable to every context.
    fn matches(filters: &Value, context: &Value) -> bool {
        let Some(filter_obj) = filters.as_object() else {
            return true;
        };
        let Some(context_obj) = context.as_object() else {
            return filter_obj.is_empty();
        };
        filter_obj.iter().all(|(key, expected)| context_obj.get(key) == Some(expected))
    }
}

impl Default for InMemoryProceduralMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MemoryBackend for InMemoryProceduralMemory {
    fn guarantees(&self) -> Vec<Guarantee> {
        vec![Guarantee::Durable]
    }

    async fn store(&self, entry: MemoryEntry) -> Result<String> {
        let pattern = ActionPattern {
            id: entry.key.clone(),
            description: entry.content.to_string(),
            steps: Vec::new(),
            success_rate: 0.0,
            usage_count: 0,
            applicability_filters: Value::Null,
        };
        self.store_pattern(pattern).await
    }

    async fn retrieve(&self, key: &str) -> Result<MemoryEntry> {
        let pattern = self.patterns.get(key).ok_or_else(|| MemoryError::NotFound(key.to_string()))?;
        Ok(MemoryEntry::new(serde_json::to_value(&*pattern)?).with_key(pattern.id.clone()))
    }

    async fn search(&self, query: &str, limit: usize, _filters: Option<Value>) -> Result<Vec<MemoryEntry>> {
        Ok(self
            .patterns
            .iter()
            .filter(|p| p.description.contains(query))
            .take(limit)
            .map(|p| MemoryEntry::new(serde_json::to_value(&*p).unwrap_or(Value::Null)).with_key(p.id.clone()))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.patterns.remove(key);
        Ok(())
    }

    async fn clear(&self, pattern: Option<&str>) -> Result<usize> {
        let doomed: Vec<String> = match pattern {
            None => self.patterns.iter().map(|p| p.key().clone()).collect(),
            Some(p) => self.patterns.iter().filter(|e| e.key().contains(p)).map(|e| e.key().clone()).collect(),
        };
        for key in &doomed {
            self.patterns.remove(key);
        }
        Ok(doomed.len())
    }

    async fn list_keys(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        Ok(self
            .patterns
            .iter()
            .map(|p| p.key().clone())
            .filter(|k| pattern.map_or(true, |p| k.contains(p)))
            .collect())
    }

    async fn get_usage_stats(&self) -> Result<UsageStats> {
        Ok(UsageStats {
            entry_count: self.patterns.len(),
            total_token_usage: 0,
            total_cost_usd: 0.0,
        })
    }
}

#[async_trait::async_trait]
impl ProceduralMemory for InMemoryProceduralMemory {
    async fn store_pattern(&self, pattern: ActionPattern) -> Result<String> {
        let id = pattern.id.clone();
        self.patterns.insert(id.clone(), pattern);
        Ok(id)
    }

    async fn applicable_patterns(&self, context: &Value) -> Result<Vec<ActionPattern>> {
        let mut matching: Vec<ActionPattern> = self
            .patterns
            .iter()
            .filter(|p| Self::matches(&p.applicability_filters, context))
            .map(|p| p.clone())
            .collect();
        matching.sort_by(|a, b| b.success_rate.partial_cmp(&a.success_rate).unwrap_or(std::cmp::Ordering::Equal));
        Ok(matching)
    }

    async fn record_outcome(&self, pattern_id: &str, succeeded: bool) -> Result<()> {
        let mut pattern = self.patterns.get_mut(pattern_id).ok_or_else(|| MemoryError::NotFound(pattern_id.to_string()))?;
        let successes_so_far = pattern.success_rate * pattern.usage_count as f64;
        pattern.usage_count += 1;
        let successes = successes_so_far + f64::from(u8::from(succeeded));
        pattern.success_rate = successes / pattern.usage_count as f64;
        Ok(())
    }

    async fn compose(&self, id: &str, description: &str, pattern_ids: &[String]) -> Result<ActionPattern> {
        let mut steps = Vec::new();
        let mut success_rate_sum = 0.0;
        for source_id in pattern_ids {
            let source = self.patterns.get(source_id).ok_or_else(|| MemoryError::NotFound(source_id.clone()))?;
            steps.extend(source.steps.clone());
            success_rate_sum += source.success_rate;
        }
        let composed = ActionPattern {
            id: id.to_string(),
            description: description.to_string(),
            steps,
            success_rate: if pattern_ids.is_empty() { 0.0 } else { success_rate_sum / pattern_ids.len() as f64 },
            usage_count: 0,
            applicability_filters: Value::Null,
        };
        self.patterns.insert(id.to_string(), composed.clone());
        Ok(composed)
    }
}
