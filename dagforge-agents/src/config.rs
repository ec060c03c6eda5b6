//! ABOUTME: Typed view of a node's `agent_config`, deserialized from the blueprint's JSON value
//! ABOUTME: Per-invocation tunables for an agent's reasoning loop

use serde::{Deserialize, Serialize};

fn default_system_prompt() -> String {
    "You are a helpful agent. Use the tools available to you when they help \
     you answer; otherwise respond directly."
        .to_string()
}

fn default_stop_on_empty_tool_call() -> bool {
    true
}

/// Deserialized shape of `NodeKind::Agent::agent_config`. Unknown fields are
/// ignored rather than rejected, so a blueprint authored against a newer
/// builder doesn't fail an older runtime's validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRuntimeConfig {
    pub model: String,
    pub provider: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Any one of these strings appearing verbatim in a completion ends
    /// the iteration loop early (an explicit stop token).
    #[serde(default)]
    pub stop_sequences: Vec<String>,
    /// Whether an empty tool call (no `tool_call` field and no further
    /// content) ends the loop; disabling it is only useful for agents that always
    /// expect a tool call and should fail loudly instead.
    #[serde(default = "default_stop_on_empty_tool_call")]
    pub stop_on_empty_tool_call: bool,
    /// Working-memory capacity for this agent's iteration scratchpad.
    #[serde(default = "default_scratchpad_capacity")]
    pub scratchpad_capacity: usize,
}

fn default_scratchpad_capacity() -> usize {
    64
}

impl AgentRuntimeConfig {
    /// Parses `agent_config` (a JSON object), defaulting to an empty
    /// object when the node declared none — a blueprint is still free to
    /// omit `agent_config` entirely, relying on every field default.
    pub fn parse(agent_config: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(agent_config.clone())
    }
}
