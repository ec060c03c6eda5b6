//! ABOUTME: In-memory blueprint store with optimistic concurrency
//! ABOUTME: revindex/rev layout mirrors the documented best-effort persistence key scheme

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use dagforge_core::blueprint::{Blueprint, NEW_BLUEPRINT_LOCK};
use dagforge_core::node::NodeConfig;
use dagforge_graph::DependencyGraph;

use crate::error::{Result, StorageError};
use crate::patch::{apply_patches, NodePatch};

/// An immutable revision snapshot, addressed `rev:{workflow_id}:{rev_id}`
/// in the persistence layout.
#[derive(Debug, Clone)]
pub struct Revision {
    pub rev_id: String,
    pub blueprint: Blueprint,
    pub lock: String,
    pub created_at: DateTime<Utc>,
}

struct Entry {
    blueprint: Blueprint,
    lock: String,
    revisions: RwLock<Vec<Revision>>,
}

/// `id → Blueprint` store guarded by a SHA-256 content-hash version lock.
///
/// All mutating operations (`create`/`put`/`patch`/`delete`) require the
/// caller to present the lock they last observed; `PreconditionRequired`
/// signals a missing lock, `Conflict` a stale one. Every successful mutation
/// appends an immutable revision to `revindex:{id}`, best-effort (lost on
/// process restart; durable persistence is a host concern).
pub struct BlueprintStore {
    entries: DashMap<String, Entry>,
}

impl BlueprintStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Creates a new blueprint. The caller must present the sentinel lock
    /// `__new__`; any other value is rejected so creation cannot silently
    /// overwrite an existing id under a guessed lock.
    pub fn create(&self, id: &str, blueprint: Blueprint, presented_lock: &str) -> Result<String> {
        if presented_lock != NEW_BLUEPRINT_LOCK {
            return Err(StorageError::PreconditionRequired(id.to_string()));
        }
        if self.entries.contains_key(id) {
            return Err(StorageError::Conflict {
                id: id.to_string(),
                presented: presented_lock.to_string(),
                current: self.entries.get(id).unwrap().lock.clone(),
            });
        }

        DependencyGraph::build(blueprint.nodes.clone())?;
        let lock = blueprint.compute_lock();
        let revision = Revision {
            rev_id: lock.clone(),
            blueprint: blueprint.clone(),
            lock: lock.clone(),
            created_at: Utc::now(),
        };
        self.entries.insert(
            id.to_string(),
            Entry {
                blueprint,
                lock: lock.clone(),
                revisions: RwLock::new(vec![revision]),
            },
        );
        Ok(lock)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<(Blueprint, String)> {
        self.entries
            .get(id)
            .map(|entry| (entry.blueprint.clone(), entry.lock.clone()))
    }

    /// Wholesale replace, requiring the presented lock to match the
    /// current one.
    pub fn put(&self, id: &str, blueprint: Blueprint, presented_lock: &str) -> Result<String> {
        self.check_lock(id, presented_lock)?;
        DependencyGraph::build(blueprint.nodes.clone())?;

        let new_lock = blueprint.compute_lock();
        self.record_and_swap(id, blueprint, new_lock.clone());
        Ok(new_lock)
    }

    /// Applies add/update/remove node patches, re-validates the resulting
    /// blueprint as a whole graph, and swaps it in if valid.
    pub fn patch(&self, id: &str, patches: Vec<NodePatch>, presented_lock: &str) -> Result<String> {
        self.check_lock(id, presented_lock)?;

        let mut nodes: Vec<NodeConfig> = self
            .entries
            .get(id)
            .expect("presence checked by check_lock")
            .blueprint
            .nodes
            .clone();
        apply_patches(&mut nodes, patches);

        DependencyGraph::build(nodes.clone())?;

        let schema_version = self.entries.get(id).unwrap().blueprint.schema_version.clone();
        let metadata = self.entries.get(id).unwrap().blueprint.metadata.clone();
        let mut blueprint = Blueprint::new(schema_version, nodes);
        blueprint.metadata = metadata;

        let new_lock = blueprint.compute_lock();
        self.record_and_swap(id, blueprint, new_lock.clone());
        Ok(new_lock)
    }

    pub fn delete(&self, id: &str, presented_lock: &str) -> Result<()> {
        self.check_lock(id, presented_lock)?;
        self.entries.remove(id);
        Ok(())
    }

    #[must_use]
    pub fn revisions(&self, id: &str) -> Vec<Revision> {
        self.entries
            .get(id)
            .map(|entry| entry.revisions.read().clone())
            .unwrap_or_default()
    }

    fn check_lock(&self, id: &str, presented_lock: &str) -> Result<()> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        if presented_lock.is_empty() {
            return Err(StorageError::PreconditionRequired(id.to_string()));
        }
        if entry.lock != presented_lock {
            return Err(StorageError::Conflict {
                id: id.to_string(),
                presented: presented_lock.to_string(),
                current: entry.lock.clone(),
            });
        }
        Ok(())
    }

    fn record_and_swap(&self, id: &str, blueprint: Blueprint, new_lock: String) {
        let mut entry = self.entries.get_mut(id).expect("presence checked by caller");
        entry.revisions.write().push(Revision {
            rev_id: new_lock.clone(),
            blueprint: blueprint.clone(),
            lock: new_lock.clone(),
            created_at: Utc::now(),
        });
        entry.blueprint = blueprint;
        entry.lock = new_lock;
    }
}

impl Default for BlueprintStore {
    fn default() -> Self {
        Self::new()
    }
}
