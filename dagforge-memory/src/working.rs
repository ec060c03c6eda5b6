//! ABOUTME: Working memory — ephemeral, LRU-bounded, TTL-expired

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{MemoryError, Result};
use crate::traits::MemoryBackend;
use crate::types::{Guarantee, MemoryEntry, UsageStats};

struct Slot {
    entry: MemoryEntry,
    expires_at: Option<Instant>,
}

/// In-process scratch memory. Bounded by entry count (LRU eviction) and,
/// if configured, a per-entry TTL checked lazily on read.
pub struct WorkingMemory {
    cache: Mutex<LruCache<String, Slot>>,
    ttl: Option<Duration>,
}

impl WorkingMemory {
    #[must_use]
    pub fn new(max_entries: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap();
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    fn is_expired(slot: &Slot) -> bool {
        slot.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

#[async_trait]
impl MemoryBackend for WorkingMemory {
    fn guarantees(&self) -> Vec<Guarantee> {
        if self.ttl.is_some() {
            vec![Guarantee::Ephemeral, Guarantee::Ttl]
        } else {
            vec![Guarantee::Ephemeral]
        }
    }

    async fn store(&self, entry: MemoryEntry) -> Result<String> {
        let key = entry.key.clone();
        let expires_at = self.ttl.map(|ttl| Instant::now() + ttl);
        self.cache.lock().put(key.clone(), Slot { entry, expires_at });
        Ok(key)
    }

    async fn retrieve(&self, key: &str) -> Result<MemoryEntry> {
        let mut cache = self.cache.lock();
        let expired = cache.peek(key).is_some_and(Self::is_expired);
        if expired {
            cache.pop(key);
        }
        match cache.get_mut(key) {
            Some(slot) => {
                slot.entry.access_count += 1;
                Ok(slot.entry.clone())
            }
            None => Err(MemoryError::NotFound(key.to_string())),
        }
    }

    async fn search(&self, query: &str, limit: usize, _filters: Option<Value>) -> Result<Vec<MemoryEntry>> {
        let mut cache = self.cache.lock();
        let matches: Vec<MemoryEntry> = cache
            .iter()
            .filter(|(_, slot)| !Self::is_expired(slot))
            .filter(|(_, slot)| slot.entry.content.to_string().contains(query))
            .take(limit)
            .map(|(_, slot)| slot.entry.clone())
            .collect();
        Ok(matches)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.lock().pop(key);
        Ok(())
    }

    async fn clear(&self, pattern: Option<&str>) -> Result<usize> {
        let mut cache = self.cache.lock();
        match pattern {
            None => {
                let count = cache.len();
                cache.clear();
                Ok(count)
            }
            Some(p) => {
                let doomed: Vec<String> = cache
                    .iter()
                    .filter(|(k, _)| k.contains(p))
                    .map(|(k, _)| k.clone())
                    .collect();
                for key in &doomed {
                    cache.pop(key);
                }
                Ok(doomed.len())
            }
        }
    }

    async fn list_keys(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let cache = self.cache.lock();
        Ok(cache
            .iter()
            .filter(|(_, slot)| !Self::is_expired(slot))
            .map(|(k, _)| k.clone())
            .filter(|k| pattern.map_or(true, |p| k.contains(p)))
            .collect())
    }

    async fn get_usage_stats(&self) -> Result<UsageStats> {
        let cache = self.cache.lock();
        let mut stats = UsageStats::default();
        for (_, slot) in cache.iter() {
            if Self::is_expired(slot) {
                continue;
            }
            stats.entry_count += 1;
            stats.total_token_usage += slot.entry.token_usage;
            stats.total_cost_usd += slot.entry.cost_usd;
        }
        Ok(stats)
    }
}
