//! ABOUTME: Event bus — publish in emission order, subscribe globally or per-type
//! ABOUTME: Per-workflow sequence counters give a stable order even when multiple runs publish concurrently

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::event::{EventEnvelope, WorkflowEvent};

const CHANNEL_CAPACITY: usize = 4096;

/// Process-wide (or per-engine-instance) event bus. Every `publish` goes
/// out on the global channel and, if any per-type subscriber exists, on
/// that type's channel too — a dual broadcast/DashMap routing scheme
/// without flow-control or persistence layers, both of which are host
/// concerns outside this runtime core.
pub struct EventBus {
    global_tx: broadcast::Sender<EventEnvelope>,
    per_type: DashMap<&'static str, broadcast::Sender<EventEnvelope>>,
    sequences: Arc<DashMap<String, AtomicU64>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (global_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            global_tx,
            per_type: DashMap::new(),
            sequences: Arc::new(DashMap::new()),
        }
    }

    /// Next sequence number for `workflow_id`, monotonically increasing
    /// per workflow run (teacher pattern: a global `AtomicU64`, scoped here
    /// per-workflow since multiple runs share one bus instance).
    fn next_sequence(&self, workflow_id: &str) -> u64 {
        self.sequences
            .entry(workflow_id.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::SeqCst)
    }

    /// Wraps `event` in its envelope and publishes it on the global channel
    /// and, if present, its type-specific channel.
    pub fn publish(&self, workflow_id: &str, event: WorkflowEvent) -> EventEnvelope {
        let envelope = EventEnvelope {
            id: Uuid::new_v4(),
            workflow_id: workflow_id.to_string(),
            sequence: self.next_sequence(workflow_id),
            timestamp: chrono::Utc::now(),
            event,
        };

        if self.global_tx.send(envelope.clone()).is_err() {
            debug!(workflow_id, "no global subscribers for event");
        }
        if let Some(tx) = self.per_type.get(envelope.label()) {
            if tx.send(envelope.clone()).is_err() {
                debug!(workflow_id, kind = envelope.label(), "no per-type subscribers for event");
            }
        }

        envelope
    }

    /// Subscribe to every event, in emission order.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.global_tx.subscribe()
    }

    /// Subscribe to only events whose `WorkflowEvent::label()` matches
    /// `kind` (e.g. `"node_failed"`).
    pub fn subscribe_to(&self, kind: &'static str) -> broadcast::Receiver<EventEnvelope> {
        self.per_type
            .entry(kind)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequence_is_monotonic_per_workflow() {
        let bus = EventBus::new();
        let e1 = bus.publish("wf1", WorkflowEvent::WorkflowStarted { blueprint_id: "b".into() });
        let e2 = bus.publish("wf1", WorkflowEvent::WorkflowStarted { blueprint_id: "b".into() });
        assert_eq!(e1.sequence, 0);
        assert_eq!(e2.sequence, 1);
    }

    #[tokio::test]
    async fn sequences_are_independent_per_workflow() {
        let bus = EventBus::new();
        let e1 = bus.publish("wf1", WorkflowEvent::WorkflowStarted { blueprint_id: "b".into() });
        let e2 = bus.publish("wf2", WorkflowEvent::WorkflowStarted { blueprint_id: "b".into() });
        assert_eq!(e1.sequence, 0);
        assert_eq!(e2.sequence, 0);
    }

    #[tokio::test]
    async fn global_subscriber_sees_every_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish("wf1", WorkflowEvent::WorkflowStarted { blueprint_id: "b".into() });
        let received = rx.recv().await.unwrap();
        assert_eq!(received.label(), "workflow_started");
    }

    #[tokio::test]
    async fn per_type_subscriber_only_sees_matching_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_to("node_failed");
        bus.publish("wf1", WorkflowEvent::WorkflowStarted { blueprint_id: "b".into() });
        bus.publish(
            "wf1",
            WorkflowEvent::NodeStarted { node_id: "n1".into(), kind: "tool".into(), level: 1 },
        );

        // node_failed was never published, so the channel should be empty
        // of those two events; publish one now and confirm it is seen.
        use dagforge_core::result::{ErrorKind, NodeExecutionResult};
        bus.publish(
            "wf1",
            WorkflowEvent::NodeFailed {
                node_id: "n1".into(),
                result: Box::new(NodeExecutionResult::failure("n1", "tool", "boom", ErrorKind::Runtime)),
            },
        );
        let received = rx.recv().await.unwrap();
        assert_eq!(received.label(), "node_failed");
    }
}
