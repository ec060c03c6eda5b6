//! ABOUTME: Human-in-the-loop node executor — polls for an externally-injected response
//! ABOUTME: Modeled as a retriable upstream wait so the dispatch-level retry/backoff loop doubles as the poll

use dagforge_core::node::{NodeConfig, NodeKind};
use serde_json::Value;

use crate::dispatch::{ExecutorOutput, NodeExecutor};
use crate::error::{ExecutorError, Result};

/// A human node blocks until some out-of-band actor (a UI, a CLI prompt,
/// an approval webhook) writes a `response` value into this node's
/// context slot. Rather than a bespoke wait primitive, this reuses the
/// node's own `RetryPolicy`: an absent response surfaces as
/// `ExecutorError::Upstream`, which is retriable, so the dispatcher's
/// existing backoff loop re-polls until a response appears or the
/// node's retries are exhausted.
pub struct HumanExecutor;

#[async_trait::async_trait]
impl NodeExecutor for HumanExecutor {
    async fn invoke(&self, node: &NodeConfig, inputs: Value) -> Result<ExecutorOutput> {
        let NodeKind::Human { prompt } = &node.kind else {
            return Err(ExecutorError::Runtime(format!("{} is not a human node", node.id)));
        };

        match inputs.get("response") {
            Some(response) => Ok(ExecutorOutput::value(serde_json::json!({
                "prompt": prompt,
                "response": response,
            }))),
            None => Err(ExecutorError::Upstream(format!(
                "human node '{}' is waiting on a response",
                node.id
            ))),
        }
    }
}
