//! ABOUTME: Typed workflow events and their envelope

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use dagforge_core::result::{NodeExecutionResult, Usage};

/// The event kinds the engine emits over the course of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    WorkflowStarted {
        blueprint_id: String,
    },
    NodeStarted {
        node_id: String,
        kind: String,
        level: usize,
    },
    NodeCompleted {
        node_id: String,
        result: Box<NodeExecutionResult>,
    },
    NodeFailed {
        node_id: String,
        result: Box<NodeExecutionResult>,
    },
    WorkflowCompleted {
        total_usage: Usage,
        completed: Vec<String>,
        skipped: Vec<String>,
    },
    /// Optional, emitted per node when the host requests graph analytics
    /// alongside execution.
    GraphInsights {
        node_id: String,
        insights: Value,
    },
}

impl WorkflowEvent {
    /// The lowercase discriminant used for per-type subscription, matching
    /// the `#[serde(tag)]` rendering.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowEvent::WorkflowStarted { .. } => "workflow_started",
            WorkflowEvent::NodeStarted { .. } => "node_started",
            WorkflowEvent::NodeCompleted { .. } => "node_completed",
            WorkflowEvent::NodeFailed { .. } => "node_failed",
            WorkflowEvent::WorkflowCompleted { .. } => "workflow_completed",
            WorkflowEvent::GraphInsights { .. } => "graph_insights",
        }
    }
}

/// Every event carries `workflow_id`, a monotonic `sequence`, and a
/// wall-clock timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub workflow_id: String,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub event: WorkflowEvent,
}

impl EventEnvelope {
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.event.label()
    }
}
