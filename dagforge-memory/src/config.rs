//! ABOUTME: Typed configuration for a memory instance

use crate::types::Guarantee;

/// Pluggable backend selection: in-memory, key-value (Redis-like), and
/// SQL-like for episodic/semantic. The runtime core only ships the
/// in-memory implementations; the other variants exist so a host can
/// route to its own adapter without changing the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    InMemory,
    KeyValue,
    Sql,
}

impl Default for Backend {
    fn default() -> Self {
        Self::InMemory
    }
}

/// Per-memory configuration. One of these accompanies every `store`/
/// `retrieve` call path that a node's `memory_config` maps onto.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub backend: Backend,
    pub ttl_seconds: Option<u64>,
    pub max_entries: Option<usize>,
    pub enable_vector_search: bool,
    pub embedding_dim: Option<usize>,
    pub guarantee: Guarantee,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            ttl_seconds: None,
            max_entries: Some(10_000),
            enable_vector_search: false,
            embedding_dim: None,
            guarantee: Guarantee::Ephemeral,
        }
    }
}

impl MemoryConfig {
    #[must_use]
    pub fn working(max_entries: usize, ttl_seconds: Option<u64>) -> Self {
        Self {
            backend: Backend::InMemory,
            ttl_seconds,
            max_entries: Some(max_entries),
            enable_vector_search: false,
            embedding_dim: None,
            guarantee: if ttl_seconds.is_some() {
                Guarantee::Ttl
            } else {
                Guarantee::Ephemeral
            },
        }
    }

    #[must_use]
    pub fn vectorised(embedding_dim: usize) -> Self {
        Self {
            backend: Backend::InMemory,
            ttl_seconds: None,
            max_entries: None,
            enable_vector_search: true,
            embedding_dim: Some(embedding_dim),
            guarantee: Guarantee::Vectorised,
        }
    }

    /// The requested guarantee must be one that `offered` (the backend's
    /// declared set) actually contains.
    pub fn check_guarantee(&self, offered: &[Guarantee]) -> crate::error::Result<()> {
        if offered.contains(&self.guarantee) {
            Ok(())
        } else {
            Err(crate::error::MemoryError::GuaranteeMismatch {
                requested: self.guarantee,
                offered: offered.to_vec(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectorised_guarantee_rejected_by_ephemeral_backend() {
        let config = MemoryConfig::vectorised(384);
        let err = config.check_guarantee(&[Guarantee::Ephemeral]).unwrap_err();
        assert!(matches!(err, crate::error::MemoryError::GuaranteeMismatch { .. }));
    }

    #[test]
    fn subset_guarantee_accepted() {
        let config = MemoryConfig::working(100, None);
        assert!(config
            .check_guarantee(&[Guarantee::Ephemeral, Guarantee::Ttl])
            .is_ok());
    }
}
