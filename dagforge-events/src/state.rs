//! ABOUTME: Per-run execution state: the workflow state machine plus checkpoint/resume

use std::collections::{HashMap, HashSet};

use dagforge_core::node::NodeId;
use dagforge_core::result::{NodeExecutionResult, Usage};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StateError};

/// `Initializing → Validating → Executing → (Completed | Failed | Cancelled)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Initializing,
    Validating,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowState {
    fn can_transition_to(self, next: WorkflowState) -> bool {
        use WorkflowState::{Cancelled, Completed, Executing, Failed, Initializing, Validating};
        matches!(
            (self, next),
            (Initializing, Validating)
                | (Validating, Executing)
                | (Validating, Failed)
                | (Executing, Completed)
                | (Executing, Failed)
                | (Executing, Cancelled)
        )
    }
}

/// A serializable snapshot sufficient to resume a run at the lowest
/// incomplete level: branch decisions, completed set, partial outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub workflow_id: String,
    pub state: WorkflowState,
    pub completed: HashSet<NodeId>,
    pub skipped: HashSet<NodeId>,
    pub branch_decisions: HashMap<NodeId, bool>,
    pub partial_outputs: HashMap<NodeId, serde_json::Value>,
    pub total_usage: Usage,
}

/// Accumulates state for a single run: the state-machine position, every
/// node result seen so far, branch decisions, and running totals.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub workflow_id: String,
    state: WorkflowState,
    completed: HashSet<NodeId>,
    skipped: HashSet<NodeId>,
    results: HashMap<NodeId, NodeExecutionResult>,
    branch_decisions: HashMap<NodeId, bool>,
    total_usage: Usage,
}

impl ExecutionState {
    #[must_use]
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            state: WorkflowState::Initializing,
            completed: HashSet::new(),
            skipped: HashSet::new(),
            results: HashMap::new(),
            branch_decisions: HashMap::new(),
            total_usage: Usage::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn transition_to(&mut self, next: WorkflowState) -> Result<()> {
        if self.state.can_transition_to(next) {
            self.state = next;
            Ok(())
        } else {
            Err(StateError::IllegalTransition { from: self.state, to: next })
        }
    }

    /// Records a node's result, updating the completed/skipped sets and
    /// the running token/cost totals.
    pub fn record_result(&mut self, node_id: &NodeId, result: NodeExecutionResult) {
        if result.success {
            self.completed.insert(node_id.clone());
        }
        if let Some(usage) = &result.usage {
            self.total_usage.tokens_in += usage.tokens_in;
            self.total_usage.tokens_out += usage.tokens_out;
            self.total_usage.cost_usd += usage.cost_usd;
        }
        self.results.insert(node_id.clone(), result);
    }

    pub fn mark_skipped(&mut self, node_id: &NodeId) {
        self.skipped.insert(node_id.clone());
    }

    /// Records a condition node's branch decision. This is unconditional
    /// once the node's output contains `{"result": bool}` — independent of
    /// whether the node reported usage. See `dagforge-workflows::branch`,
    /// which is the caller of this method.
    pub fn record_branch_decision(&mut self, node_id: &NodeId, decision: bool) {
        self.branch_decisions.insert(node_id.clone(), decision);
    }

    #[must_use]
    pub fn is_completed(&self, node_id: &NodeId) -> bool {
        self.completed.contains(node_id)
    }

    #[must_use]
    pub fn is_skipped(&self, node_id: &NodeId) -> bool {
        self.skipped.contains(node_id)
    }

    #[must_use]
    pub fn branch_decision(&self, node_id: &NodeId) -> Option<bool> {
        self.branch_decisions.get(node_id).copied()
    }

    #[must_use]
    pub fn result(&self, node_id: &NodeId) -> Option<&NodeExecutionResult> {
        self.results.get(node_id)
    }

    #[must_use]
    pub fn total_usage(&self) -> &Usage {
        &self.total_usage
    }

    #[must_use]
    pub fn completed_ids(&self) -> Vec<NodeId> {
        self.completed.iter().cloned().collect()
    }

    #[must_use]
    pub fn skipped_ids(&self) -> Vec<NodeId> {
        self.skipped.iter().cloned().collect()
    }

    /// Serializes a snapshot sufficient to resume this run later.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        let partial_outputs = self
            .results
            .iter()
            .filter_map(|(id, result)| result.output.clone().map(|output| (id.clone(), output)))
            .collect();
        Checkpoint {
            workflow_id: self.workflow_id.clone(),
            state: self.state,
            completed: self.completed.clone(),
            skipped: self.skipped.clone(),
            branch_decisions: self.branch_decisions.clone(),
            partial_outputs,
            total_usage: self.total_usage.clone(),
        }
    }

    /// Rebuilds execution state from a checkpoint. `results` is left
    /// empty; callers resuming a run re-enter at the lowest incomplete
    /// level and re-derive full `NodeExecutionResult`s only for nodes that
    /// actually re-execute, reading `partial_outputs` for everything else.
    #[must_use]
    pub fn resume_from(checkpoint: Checkpoint) -> Self {
        Self {
            workflow_id: checkpoint.workflow_id,
            state: checkpoint.state,
            completed: checkpoint.completed,
            skipped: checkpoint.skipped,
            results: HashMap::new(),
            branch_decisions: checkpoint.branch_decisions,
            total_usage: checkpoint.total_usage,
        }
    }

    /// The lowest level, among `levels`, that still has an incomplete,
    /// non-skipped node — the level a resumed run should re-enter at.
    #[must_use]
    pub fn lowest_incomplete_level(&self, levels: &HashMap<NodeId, usize>) -> Option<usize> {
        levels
            .iter()
            .filter(|(id, _)| !self.completed.contains(*id) && !self.skipped.contains(*id))
            .map(|(_, level)| *level)
            .min()
    }
}
