//! ABOUTME: Branch gating — which nodes are "active" given the condition decisions recorded so far
//! ABOUTME: Activation gates propagate transitively over `dependencies`

use std::collections::HashMap;

use dagforge_core::node::{NodeConfig, NodeId, NodeKind};

/// Maps every node to the set of `(condition_id, required_branch)` pairs it
/// must satisfy to run. A node gated by more than one condition (nested
/// branches) must satisfy all of them; a node with no entry is always
/// active. Built once per run from the blueprint's `Condition` nodes and
/// propagated down the dependency chain, so a node two hops below a
/// `true_branch` target inherits that gate even though it isn't named in
/// `true_branch` itself.
#[derive(Debug, Default)]
pub struct BranchResolver {
    gates: HashMap<NodeId, Vec<(NodeId, bool)>>,
}

impl BranchResolver {
    #[must_use]
    pub fn build(nodes: &[NodeConfig]) -> Self {
        let mut direct: HashMap<NodeId, Vec<(NodeId, bool)>> = HashMap::new();
        for node in nodes {
            if let NodeKind::Condition(config) = &node.kind {
                for target in &config.true_branch {
                    direct.entry(target.clone()).or_default().push((node.id.clone(), true));
                }
                for target in &config.false_branch {
                    direct.entry(target.clone()).or_default().push((node.id.clone(), false));
                }
            }
        }

        let deps: HashMap<NodeId, Vec<NodeId>> =
            nodes.iter().map(|n| (n.id.clone(), n.dependencies.clone())).collect();

        let mut memo: HashMap<NodeId, Vec<(NodeId, bool)>> = HashMap::new();
        for node in nodes {
            resolve(&node.id, &deps, &direct, &mut memo);
        }
        Self { gates: memo }
    }

    /// `decision_of(condition_id)` should return the recorded branch
    /// decision for that condition, or `None` if it hasn't run yet (in
    /// which case `node_id` is treated as not-yet-active).
    #[must_use]
    pub fn is_active(&self, node_id: &str, decision_of: impl Fn(&str) -> Option<bool>) -> bool {
        match self.gates.get(node_id) {
            None => true,
            Some(gates) => gates
                .iter()
                .all(|(cond_id, required)| decision_of(cond_id) == Some(*required)),
        }
    }
}

fn resolve(
    id: &str,
    deps: &HashMap<NodeId, Vec<NodeId>>,
    direct: &HashMap<NodeId, Vec<(NodeId, bool)>>,
    memo: &mut HashMap<NodeId, Vec<(NodeId, bool)>>,
) -> Vec<(NodeId, bool)> {
    if let Some(cached) = memo.get(id) {
        return cached.clone();
    }
    let mut combined: Vec<(NodeId, bool)> = direct.get(id).cloned().unwrap_or_default();
    if let Some(parents) = deps.get(id) {
        for parent in parents {
            for gate in resolve(parent, deps, direct, memo) {
                if !combined.contains(&gate) {
                    combined.push(gate);
                }
            }
        }
    }
    memo.insert(id.to_string(), combined.clone());
    combined
}
