//! ABOUTME: Semantic memory — domain facts as entities/relationships, optional vector index

use dashmap::DashMap;
use serde_json::Value;

use crate::error::{MemoryError, Result};
use crate::traits::{Entity, MemoryBackend, Relationship, SemanticMemory};
use crate::types::{Guarantee, MemoryEntry, UsageStats};

/// In-process entity/relationship store. When `embedding_dim` is set,
/// every upserted embedding must match it exactly; mismatches surface as
/// `MemoryError::DimensionMismatch` on upsert and on query alike.
pub struct InMemorySemanticMemory {
    entities: DashMap<String, Entity>,
    embeddings: DashMap<String, Vec<f32>>,
    relationships: DashMap<String, Relationship>,
    embedding_dim: Option<usize>,
}

impl InMemorySemanticMemory {
    #[must_use]
    pub fn new(embedding_dim: Option<usize>) -> Self {
        Self {
            entities: DashMap::new(),
            embeddings: DashMap::new(),
            relationships: DashMap::new(),
            embedding_dim,
        }
    }

    fn check_dim(&self, embedding: &[f32]) -> Result<()> {
        match self.embedding_dim {
            Some(expected) if expected != embedding.len() => Err(MemoryError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            }),
            _ => Ok(()),
        }
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            dot / (norm_a * norm_b)
        }
    }
}

#[async_trait::async_trait]
impl MemoryBackend for InMemorySemanticMemory {
    fn guarantees(&self) -> Vec<Guarantee> {
        if self.embedding_dim.is_some() {
            vec![Guarantee::Durable, Guarantee::Vectorised]
        } else {
            vec![Guarantee::Durable]
        }
    }

    async fn store(&self, entry: MemoryEntry) -> Result<String> {
        let entity = Entity {
            id: entry.key.clone(),
            entity_type: "fact".into(),
            name: entry.key.clone(),
            properties: entry.content.clone(),
        };
        self.upsert_entity(entity, None).await?;
        Ok(entry.key)
    }

    async fn retrieve(&self, key: &str) -> Result<MemoryEntry> {
        let entity = self.get_entity(key).await?;
        Ok(MemoryEntry::new(entity.properties).with_key(entity.id))
    }

    async fn search(&self, query: &str, limit: usize, _filters: Option<Value>) -> Result<Vec<MemoryEntry>> {
        Ok(self
            .entities
            .iter()
            .filter(|e| e.name.contains(query) || e.properties.to_string().contains(query))
            .take(limit)
            .map(|e| MemoryEntry::new(e.properties.clone()).with_key(e.id.clone()))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entities.remove(key);
        self.embeddings.remove(key);
        Ok(())
    }

    async fn clear(&self, pattern: Option<&str>) -> Result<usize> {
        let doomed: Vec<String> = match pattern {
            None => self.entities.iter().map(|e| e.key().clone()).collect(),
            Some(p) => self.entities.iter().filter(|e| e.key().contains(p)).map(|e| e.key().clone()).collect(),
        };
        for key in &doomed {
            self.entities.remove(key);
            self.embeddings.remove(key);
        }
        Ok(doomed.len())
    }

    async fn list_keys(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        Ok(self
            .entities
            .iter()
            .map(|e| e.key().clone())
            .filter(|k| pattern.map_or(true, |p| k.contains(p)))
            .collect())
    }

    async fn get_usage_stats(&self) -> Result<UsageStats> {
        Ok(UsageStats {
            entry_count: self.entities.len(),
            total_token_usage: 0,
            total_cost_usd: 0.0,
        })
    }
}

#[async_trait::async_trait]
impl SemanticMemory for InMemorySemanticMemory {
    async fn upsert_entity(&self, entity: Entity, embedding: Option<Vec<f32>>) -> Result<()> {
        if let Some(embedding) = &embedding {
            self.check_dim(embedding)?;
        }
        let id = entity.id.clone();
        self.entities.insert(id.clone(), entity);
        if let Some(embedding) = embedding {
            self.embeddings.insert(id, embedding);
        }
        Ok(())
    }

    async fn get_entity(&self, id: &str) -> Result<Entity> {
        self.entities.get(id).map(|e| e.clone()).ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }

    async fn upsert_relationship(&self, relationship: Relationship) -> Result<()> {
        self.relationships.insert(relationship.id.clone(), relationship);
        Ok(())
    }

    async fn relationships_of(&self, entity_id: &str) -> Result<Vec<Relationship>> {
        Ok(self
            .relationships
            .iter()
            .filter(|r| r.from_entity == entity_id || r.to_entity == entity_id)
            .map(|r| r.clone())
            .collect())
    }

    async fn vector_search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<Entity>> {
        self.check_dim(query_embedding)?;
        let mut scored: Vec<(f32, Entity)> = self
            .embeddings
            .iter()
            .filter_map(|pair| {
                self.entities.get(pair.key()).map(|e| (Self::cosine_similarity(query_embedding, pair.value()), e.clone()))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(limit).map(|(_, entity)| entity).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(id: &str) -> Entity {
        Entity {
            id: id.into(),
            entity_type: "person".into(),
            name: id.into(),
            properties: json!({}),
        }
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_length_embedding() {
        let memory = InMemorySemanticMemory::new(Some(3));
        let err = memory.upsert_entity(entity("a"), Some(vec![1.0, 2.0])).await.unwrap_err();
        assert!(matches!(err, MemoryError::DimensionMismatch { expected: 3, actual: 2 }));
    }

    #[tokio::test]
    async fn query_rejects_wrong_length_embedding() {
        let memory = InMemorySemanticMemory::new(Some(3));
        memory.upsert_entity(entity("a"), Some(vec![1.0, 0.0, 0.0])).await.unwrap();
        let err = memory.vector_search(&[1.0, 0.0], 5).await.unwrap_err();
        assert!(matches!(err, MemoryError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn vector_search_ranks_by_similarity() {
        let memory = InMemorySemanticMemory::new(Some(2));
        memory.upsert_entity(entity("same"), Some(vec![1.0, 0.0])).await.unwrap();
        memory.upsert_entity(entity("orthogonal"), Some(vec![0.0, 1.0])).await.unwrap();
        let results = memory.vector_search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results[0].id, "same");
    }

    #[tokio::test]
    async fn relationships_of_filters_by_either_endpoint() {
        let memory = InMemorySemanticMemory::new(None);
        memory
            .upsert_relationship(Relationship {
                id: "r1".into(),
                from_entity: "a".into(),
                to_entity: "b".into(),
                relationship_type: "knows".into(),
                properties: json!({}),
            })
            .await
            .unwrap();
        assert_eq!(memory.relationships_of("b").await.unwrap().len(), 1);
    }
}
