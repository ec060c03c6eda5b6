//! ABOUTME: The agent iteration loop: read memory, call LLM, maybe invoke a tool, update memory, decide to conclude
//! ABOUTME: Conversation bookkeeping through one recall/prompt/complete/act/remember cycle

use std::sync::Arc;

use dagforge_core::result::Usage;
use dagforge_executor::kinds::LlmProvider;
use dagforge_memory::{MemoryConfig, MemoryEntry, UnifiedMemory};
use dagforge_registry::Registry;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::config::AgentRuntimeConfig;
use crate::error::{AgentError, Result};
use crate::tool_call::parse_turn;
use crate::transcript::{Role, Transcript};

/// What a completed agent invocation produced, independent of the
/// registry-facing `AgentHandle` shape the node executor consumes —
/// `lib.rs` flattens this into the `Value` the executor expects.
#[derive(Debug, Clone)]
pub struct AgentRunOutput {
    pub output: Value,
    pub iterations: usize,
    pub termination_reason: String,
    pub transcript: Transcript,
    pub usage: Usage,
}

/// Why the loop stopped: an explicit stop token, an empty tool call, or
/// iteration exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    ExplicitStop,
    EmptyToolCall,
    IterationExhaustion,
}

impl StopReason {
    fn label(self) -> &'static str {
        match self {
            StopReason::ExplicitStop => "explicit_stop",
            StopReason::EmptyToolCall => "empty_tool_call",
            StopReason::IterationExhaustion => "iteration_exhaustion",
        }
    }
}

fn describe_tool(registry: &Registry, name: &str) -> String {
    match registry.get_tool(name) {
        Ok(tool) => format!("- {name}: {}", tool.description()),
        Err(_) => format!("- {name}"),
    }
}

fn build_prompt(config: &AgentRuntimeConfig, registry: &Registry, allowed_tools: &[String], transcript: &Transcript) -> String {
    let tool_lines: Vec<String> = allowed_tools.iter().map(|name| describe_tool(registry, name)).collect();
    format!(
        "{system_prompt}\n\nAvailable tools:\n{tools}\n\n\
         Respond with a single JSON object of the shape \
         {{\"content\": string, \"tool_call\": {{\"name\": string, \"args\": object}} | null, \"final\": bool}}.\n\n\
         Conversation so far:\n{transcript}",
        system_prompt = config.system_prompt,
        tools = if tool_lines.is_empty() { "(none)".to_string() } else { tool_lines.join("\n") },
        transcript = transcript.render(),
    )
}

fn contains_stop_sequence(text: &str, stops: &[String]) -> bool {
    stops.iter().any(|s| !s.is_empty() && text.contains(s.as_str()))
}

/// Runs the read-memory/call-LLM/invoke-tool/update-memory loop for one
/// agent invocation, up to `max_iterations`.
pub struct AgentLoop {
    provider: Arc<dyn LlmProvider>,
    registry: Arc<Registry>,
    memory: Option<Arc<UnifiedMemory>>,
}

impl AgentLoop {
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, registry: Arc<Registry>, memory: Option<Arc<UnifiedMemory>>) -> Self {
        Self { provider, registry, memory }
    }

    /// Pulls up to 5 relevant working-memory entries for `query` and logs
    /// them into the transcript as prior context. Absent memory is a no-op,
    /// not an error — an agent node may legitimately have no `memory_config`.
    async fn recall(&self, query: &str, transcript: &mut Transcript) -> Result<()> {
        let Some(memory) = &self.memory else {
            return Ok(());
        };
        let hits = memory.working().search(query, 5, None).await?;
        for hit in hits {
            transcript.push(Role::System, format!("recalled: {}", hit.content));
        }
        Ok(())
    }

    /// Persists one iteration's tool observation into working memory.
    /// Best-effort: a memory write failure downgrades to a warning rather than failing
    /// the iteration, since the loop has already produced a valid turn.
    async fn remember(&self, config: &AgentRuntimeConfig, key: &str, content: Value) {
        let Some(memory) = &self.memory else {
            return;
        };
        let memory_config = MemoryConfig::working(config.scratchpad_capacity, None);
        let entry = MemoryEntry::new(content).with_key(key);
        if let Err(err) = memory.store_checked(memory.working(), &memory_config, entry).await {
            warn!(error = %err, "agent failed to persist iteration to working memory");
        }
    }

    #[instrument(skip(self, input, config), fields(model = %config.model, provider = %config.provider))]
    pub async fn run(
        &self,
        input: Value,
        allowed_tools: &[String],
        max_iterations: usize,
        config: &AgentRuntimeConfig,
    ) -> Result<AgentRunOutput> {
        let mut transcript = Transcript::default();
        transcript.push(Role::System, &config.system_prompt);
        let input_text = input.to_string();
        transcript.push(Role::User, &input_text);
        self.recall(&input_text, &mut transcript).await?;

        let mut usage = Usage {
            model: Some(config.model.clone()),
            provider: Some(config.provider.clone()),
            ..Default::default()
        };
        let mut last_content = String::new();
        let mut stop = StopReason::IterationExhaustion;

        let iterations = max_iterations.max(1);
        let mut used = 0;
        for iteration in 1..=iterations {
            used = iteration;
            let prompt = build_prompt(config, &self.registry, allowed_tools, &transcript);
            let completion = self
                .provider
                .complete(&config.model, &config.provider, &prompt, config.temperature, config.max_tokens)
                .await
                .map_err(AgentError::Provider)?;
            usage.tokens_in += completion.tokens_in;
            usage.tokens_out += completion.tokens_out;
            usage.cost_usd += completion.cost_usd;

            let turn = parse_turn(&completion.text);
            transcript.push(Role::Assistant, &turn.content);
            last_content = turn.content.clone();

            if contains_stop_sequence(&turn.content, &config.stop_sequences) {
                stop = StopReason::ExplicitStop;
                break;
            }

            let Some(tool_call) = turn.tool_call else {
                if config.stop_on_empty_tool_call || turn.final_turn {
                    stop = StopReason::EmptyToolCall;
                    break;
                }
                continue;
            };

            if !allowed_tools.iter().any(|t| t == &tool_call.name) {
                return Err(AgentError::ToolNotAllowed(tool_call.name));
            }
            let tool = self
                .registry
                .get_tool(&tool_call.name)
                .map_err(|e| AgentError::ToolLookup(e.to_string()))?;
            let observation = tool
                .execute(tool_call.args.clone())
                .await
                .map_err(AgentError::ToolExecution)?;

            debug!(tool = %tool_call.name, iteration, "agent invoked tool");
            transcript.push(Role::Tool, observation.to_string());
            self.remember(
                config,
                &format!("iteration:{iteration}"),
                json!({"tool": tool_call.name, "args": tool_call.args, "observation": observation}),
            )
            .await;

            if turn.final_turn {
                stop = StopReason::EmptyToolCall;
                break;
            }
        }

        Ok(AgentRunOutput {
            output: json!({ "content": last_content }),
            iterations: used,
            termination_reason: stop.label().to_string(),
            transcript,
            usage,
        })
    }
}
