//! ABOUTME: Derived graph metrics — critical path, bottlenecks, parallel opportunities
//! ABOUTME: Computed lazily from a built DependencyGraph and cached by the caller

use crate::graph::DependencyGraph;

/// Out-degree above which a node is considered a bottleneck.
const BOTTLENECK_OUT_DEGREE: usize = 3;

/// Snapshot of metrics the authoring layer and the engine both consult.
#[derive(Debug, Clone)]
pub struct GraphMetrics {
    pub critical_path_length: usize,
    pub bottlenecks: Vec<String>,
    /// Levels with more than one active node — candidates for concurrency.
    pub parallel_opportunities: Vec<usize>,
}

impl GraphMetrics {
    /// Compute metrics for a built graph.
    #[must_use]
    pub fn compute(graph: &DependencyGraph) -> Self {
        let critical_path_length = graph.max_level() + 1;

        let mut bottlenecks: Vec<String> = graph
            .node_ids()
            .filter(|id| graph.out_degree(id) > BOTTLENECK_OUT_DEGREE)
            .cloned()
            .collect();
        bottlenecks.sort();

        let parallel_opportunities: Vec<usize> = graph
            .levels
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(level, _)| *level)
            .collect();

        Self {
            critical_path_length,
            bottlenecks,
            parallel_opportunities,
        }
    }
}
