//! ABOUTME: Parses a provider completion into an iteration decision (content / tool call / conclude)
//! ABOUTME: Convention: the prompt asks the model for a JSON object; a non-JSON reply degrades to plain content

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// What one LLM turn decided to do next.
#[derive(Debug, Clone)]
pub struct AgentTurn {
    pub content: String,
    pub tool_call: Option<ToolCall>,
    /// Whether the model itself signalled it is done (no further tool call
    /// expected). A turn with no tool call and `final = false` still ends
    /// the loop per `stop_on_empty_tool_call` — see `config.rs`.
    pub final_turn: bool,
}

#[derive(Debug, Deserialize)]
struct RawTurn {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_call: Option<ToolCall>,
    #[serde(default)]
    r#final: bool,
}

/// Parses a completion's text per the tool-aware prompt convention
/// (`build_prompt` in `loop.rs`). A completion that isn't valid JSON is
/// treated as plain final content rather than an error — a model that
/// ignores the requested format shouldn't crash the agent, it should just
/// end the loop with whatever it said.
#[must_use]
pub fn parse_turn(text: &str) -> AgentTurn {
    match serde_json::from_str::<RawTurn>(text.trim()) {
        Ok(raw) => AgentTurn {
            final_turn: raw.r#final || raw.tool_call.is_none(),
            content: raw.content,
            tool_call: raw.tool_call,
        },
        Err(_) => AgentTurn {
            content: text.to_string(),
            tool_call: None,
            final_turn: true,
        },
    }
}
