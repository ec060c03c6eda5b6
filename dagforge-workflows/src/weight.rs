//! ABOUTME: Per-kind weight the weighted semaphore charges a node
//! ABOUTME: Higher weight for kinds with heavier expected resource use (LLM calls, nested agents/workflows)

use dagforge_core::node::NodeKind;

/// `weight = max(1, complexity_estimate(kind))`.
#[must_use]
pub fn complexity_estimate(kind: &NodeKind) -> u32 {
    let raw = match kind {
        NodeKind::Tool { .. }
        | NodeKind::Condition(_)
        | NodeKind::Human { .. }
        | NodeKind::Monitor { .. } => 1,
        NodeKind::Llm { .. } | NodeKind::Code { .. } | NodeKind::Loop(_) | NodeKind::Parallel(_) | NodeKind::Recursive(_) => 2,
        NodeKind::Agent { .. } | NodeKind::Workflow(_) | NodeKind::Swarm { .. } => 3,
    };
    raw.max(1)
}
