//! ABOUTME: Unified memory facade — one handle over working/episodic/semantic/procedural

use std::sync::Arc;

use serde_json::Value;

use crate::config::MemoryConfig;
use crate::error::Result;
use crate::traits::{EpisodicMemory, MemoryBackend, ProceduralMemory, SemanticMemory};
use crate::types::MemoryEntry;

/// Cost-per-token used by the provider-agnostic usage estimator. Calibrated
/// to a generic mid-tier completion model; a host wanting exact provider
/// pricing attaches its own accounting on top of `Usage` at the executor
/// level instead of here.
const DEFAULT_COST_PER_TOKEN: f64 = 0.000_002;

/// Stamps `token_usage`/`cost_usd` onto an entry at store time, using the
/// same 4-chars-per-token heuristic the context store uses so the two
/// subsystems report comparable numbers.
fn stamp_accounting(mut entry: MemoryEntry) -> MemoryEntry {
    let text = entry.content.to_string();
    let tokens = dagforge_context::estimate_tokens(&text) as u64;
    entry.token_usage = tokens;
    entry.cost_usd = tokens as f64 * DEFAULT_COST_PER_TOKEN;
    entry
}

/// One facade exposing all four memory kinds behind their respective
/// traits, so a caller (an agent, a tool) never needs to know which
/// backend implementation sits behind a given kind.
pub struct UnifiedMemory {
    working: Arc<dyn MemoryBackend>,
    episodic: Arc<dyn EpisodicMemory>,
    semantic: Arc<dyn SemanticMemory>,
    procedural: Arc<dyn ProceduralMemory>,
}

impl UnifiedMemory {
    #[must_use]
    pub fn new(
        working: Arc<dyn MemoryBackend>,
        episodic: Arc<dyn EpisodicMemory>,
        semantic: Arc<dyn SemanticMemory>,
        procedural: Arc<dyn ProceduralMemory>,
    ) -> Self {
        Self { working, episodic, semantic, procedural }
    }

    #[must_use]
    pub fn working(&self) -> &dyn MemoryBackend {
        self.working.as_ref()
    }

    #[must_use]
    pub fn episodic(&self) -> &dyn EpisodicMemory {
        self.episodic.as_ref()
    }

    #[must_use]
    pub fn semantic(&self) -> &dyn SemanticMemory {
        self.semantic.as_ref()
    }

    #[must_use]
    pub fn procedural(&self) -> &dyn ProceduralMemory {
        self.procedural.as_ref()
    }

    /// Stores into the kind identified by `config.guarantee`'s owning
    /// backend, after checking the requested guarantee and stamping cost
    /// accounting.
    /// `backend` selects which of the four kinds the caller intends;
    /// config only gates whether that backend may accept this request.
    pub async fn store_checked(
        &self,
        backend: &dyn MemoryBackend,
        config: &MemoryConfig,
        entry: MemoryEntry,
    ) -> Result<String> {
        config.check_guarantee(&backend.guarantees())?;
        backend.store(stamp_accounting(entry)).await
    }

    /// Aggregates `get_usage_stats` across every memory kind.
    pub async fn total_usage(&self) -> Result<Value> {
        let working = self.working.get_usage_stats().await?;
        let episodic = self.episodic.get_usage_stats().await?;
        let semantic = self.semantic.get_usage_stats().await?;
        let procedural = self.procedural.get_usage_stats().await?;
        Ok(serde_json::json!({
            "working": working,
            "episodic": episodic,
            "semantic": semantic,
            "procedural": procedural,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episodic::InMemoryEpisodicMemory;
    use crate::procedural::InMemoryProceduralMemory;
    use crate::semantic::InMemorySemanticMemory;
    use crate::types::Guarantee;
    use crate::working::WorkingMemory;
    use serde_json::json;

    fn facade() -> UnifiedMemory {
        UnifiedMemory::new(
            Arc::new(WorkingMemory::new(10, None)),
            Arc::new(InMemoryEpisodicMemory::new()),
            Arc::new(InMemorySemanticMemory::new(None)),
            Arc::new(InMemoryProceduralMemory::new()),
        )
    }

    #[tokio::test]
    async fn store_checked_stamps_token_and_cost() {
        let memory = facade();
        let config = MemoryConfig::working(10, None);
        let key = memory
            .store_checked(memory.working(), &config, MemoryEntry::new(json!("hello world")).with_key("k"))
            .await
            .unwrap();
        let stored = memory.working().retrieve(&key).await.unwrap();
        assert!(stored.token_usage > 0);
        assert!(stored.cost_usd > 0.0);
    }

    #[tokio::test]
    async fn store_checked_rejects_guarantee_mismatch() {
        let memory = facade();
        let mut config = MemoryConfig::working(10, None);
        config.guarantee = Guarantee::Vectorised;
        let err = memory
            .store_checked(memory.working(), &config, MemoryEntry::new(json!("x")))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::MemoryError::GuaranteeMismatch { .. }));
    }

    #[tokio::test]
    async fn total_usage_aggregates_every_kind() {
        let memory = facade();
        let config = MemoryConfig::working(10, None);
        memory
            .store_checked(memory.working(), &config, MemoryEntry::new(json!("hello")).with_key("k"))
            .await
            .unwrap();
        let usage = memory.total_usage().await.unwrap();
        assert_eq!(usage["working"]["entry_count"], json!(1));
    }
}
