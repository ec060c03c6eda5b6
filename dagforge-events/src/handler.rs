//! ABOUTME: Event handler traits for hosts that want a callback instead of a broadcast receiver

use async_trait::async_trait;

use crate::event::EventEnvelope;

/// Asynchronous event handler; a host registers one of these against a
/// bus subscription loop instead of polling a `broadcast::Receiver`
/// directly.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: EventEnvelope);

    fn name(&self) -> &str {
        "anonymous_handler"
    }
}

/// Adapts a plain closure into an `EventHandler`.
pub struct FnEventHandler<F> {
    name: String,
    handler: F,
}

impl<F> FnEventHandler<F>
where
    F: Fn(EventEnvelope) + Send + Sync,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self { name: name.into(), handler }
    }
}

#[async_trait]
impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(EventEnvelope) + Send + Sync,
{
    async fn handle_event(&self, event: EventEnvelope) {
        (self.handler)(event);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::WorkflowEvent;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[tokio::test]
    async fn fn_handler_invokes_closure() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        let handler = FnEventHandler::new("collector", move |envelope: EventEnvelope| {
            seen2.lock().push(envelope.label().to_string());
        });

        handler
            .handle_event(EventEnvelope {
                id: uuid::Uuid::new_v4(),
                workflow_id: "wf1".into(),
                sequence: 0,
                timestamp: chrono::Utc::now(),
                event: WorkflowEvent::WorkflowStarted { blueprint_id: "b".into() },
            })
            .await;

        assert_eq!(seen.lock().as_slice(), ["workflow_started"]);
    }
}
