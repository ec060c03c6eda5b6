//! ABOUTME: DAG construction and level computation
//! ABOUTME: level(n) = 1 + max(level(p) for p in dependencies(n)), base 0 for roots

use std::collections::{BTreeMap, HashMap, HashSet};

use dagforge_core::node::{NodeConfig, NodeId};

use crate::error::{GraphError, Result};

/// A built dependency graph over a blueprint's node list.
///
/// Construction is pure and order-independent: the resulting `levels` map
/// depends only on the dependency edges, never on the order nodes were
/// supplied in.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: HashMap<NodeId, NodeConfig>,
    /// dependents[n] = nodes that declare n as a dependency
    dependents: HashMap<NodeId, Vec<NodeId>>,
    pub levels: BTreeMap<usize, Vec<NodeId>>,
    level_of: HashMap<NodeId, usize>,
}

impl DependencyGraph {
    /// Build a graph from an ordered node list.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::DuplicateNodeId` if two nodes share an id,
    /// `GraphError::MissingDependency` if a dependency id is absent, and
    /// `GraphError::Cycle` if the dependency relation is not a DAG.
    pub fn build(node_list: Vec<NodeConfig>) -> Result<Self> {
        let mut nodes = HashMap::with_capacity(node_list.len());
        for node in node_list {
            if nodes.insert(node.id.clone(), node.clone()).is_some() {
                return Err(GraphError::DuplicateNodeId(node.id));
            }
        }

        for node in nodes.values() {
            for dep in &node.dependencies {
                if !nodes.contains_key(dep) {
                    return Err(GraphError::MissingDependency {
                        node: node.id.clone(),
                        dep: dep.clone(),
                    });
                }
            }
        }

        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for node in nodes.values() {
            for dep in &node.dependencies {
                dependents.entry(dep.clone()).or_default().push(node.id.clone());
            }
        }

        let level_of = compute_levels(&nodes)?;

        let mut levels: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
        for (id, level) in &level_of {
            levels.entry(*level).or_default().push(id.clone());
        }
        for ids in levels.values_mut() {
            ids.sort();
        }

        Ok(Self {
            nodes,
            dependents,
            levels,
            level_of,
        })
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&NodeConfig> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn level_of(&self, id: &str) -> Option<usize> {
        self.level_of.get(id).copied()
    }

    #[must_use]
    pub fn max_level(&self) -> usize {
        self.levels.keys().next_back().copied().unwrap_or(0)
    }

    #[must_use]
    pub fn dependents_of(&self, id: &str) -> &[NodeId] {
        self.dependents.get(id).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn in_degree(&self, id: &str) -> usize {
        self.nodes.get(id).map_or(0, |n| n.dependencies.len())
    }

    #[must_use]
    pub fn out_degree(&self, id: &str) -> usize {
        self.dependents_of(id).len()
    }

    /// Nodes with no dependents — terminal outputs of the graph.
    #[must_use]
    pub fn leaf_nodes(&self) -> Vec<NodeId> {
        let mut leaves: Vec<NodeId> = self
            .nodes
            .keys()
            .filter(|id| self.out_degree(id) == 0)
            .cloned()
            .collect();
        leaves.sort();
        leaves
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }
}

/// Compute each node's level via memoized recursion over `dependencies`,
/// detecting cycles by tracking the recursion stack.
fn compute_levels(nodes: &HashMap<NodeId, NodeConfig>) -> Result<HashMap<NodeId, usize>> {
    let mut memo: HashMap<NodeId, usize> = HashMap::new();
    let mut in_progress: HashSet<NodeId> = HashSet::new();

    // Deterministic iteration order so error messages are stable across
    // runs even though a HashMap backs `nodes`.
    let mut ids: Vec<&NodeId> = nodes.keys().collect();
    ids.sort();

    for id in ids {
        resolve_level(id, nodes, &mut memo, &mut in_progress)?;
    }
    Ok(memo)
}

fn resolve_level(
    id: &NodeId,
    nodes: &HashMap<NodeId, NodeConfig>,
    memo: &mut HashMap<NodeId, usize>,
    in_progress: &mut HashSet<NodeId>,
) -> Result<usize> {
    if let Some(level) = memo.get(id) {
        return Ok(*level);
    }
    if !in_progress.insert(id.clone()) {
        return Err(GraphError::Cycle(vec![id.clone()]));
    }

    let node = nodes.get(id).expect("caller validated dependency ids");
    let mut level = 0usize;
    for dep in &node.dependencies {
        let dep_level = resolve_level(dep, nodes, memo, in_progress)?;
        level = level.max(dep_level + 1);
    }

    in_progress.remove(id);
    memo.insert(id.clone(), level);
    Ok(level)
}
