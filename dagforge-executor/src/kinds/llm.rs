//! ABOUTME: LLM node executor — single call to a provider, no memory

use std::sync::Arc;

use dagforge_core::node::{NodeConfig, NodeKind};
use dagforge_core::result::Usage;
use serde_json::Value;

use crate::dispatch::{ExecutorOutput, NodeExecutor};
use crate::error::{ExecutorError, Result};

/// A completion from a provider, including the usage the caller bills.
#[derive(Debug, Clone)]
pub struct LlmCompletion {
    pub text: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_usd: f64,
}

/// The provider boundary. A concrete host wires a real SDK behind this;
/// the runtime core only depends on the trait, never a specific
/// third-party LLM SDK.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        provider: &str,
        prompt: &str,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> std::result::Result<LlmCompletion, String>;
}

pub struct LlmExecutor {
    provider: Arc<dyn LlmProvider>,
}

impl LlmExecutor {
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

/// Substitute `{{field}}` placeholders in `template` from `inputs`' top-level keys.
fn render_template(template: &str, inputs: &Value) -> String {
    let mut rendered = template.to_string();
    if let Some(obj) = inputs.as_object() {
        for (key, value) in obj {
            let placeholder = format!("{{{{{key}}}}}");
            let replacement = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            rendered = rendered.replace(&placeholder, &replacement);
        }
    }
    rendered
}

#[async_trait::async_trait]
impl NodeExecutor for LlmExecutor {
    async fn invoke(&self, node: &NodeConfig, inputs: Value) -> Result<ExecutorOutput> {
        let NodeKind::Llm {
            model,
            prompt_template,
            temperature,
            max_tokens,
            provider,
            ..
        } = &node.kind
        else {
            return Err(ExecutorError::Runtime(format!("{} is not an llm node", node.id)));
        };

        let prompt = render_template(prompt_template, &inputs);
        let completion = self
            .provider
            .complete(model, provider, &prompt, *temperature, *max_tokens)
            .await
            .map_err(ExecutorError::Runtime)?;

        let usage = Usage {
            tokens_in: completion.tokens_in,
            tokens_out: completion.tokens_out,
            cost_usd: completion.cost_usd,
            model: Some(model.clone()),
            provider: Some(provider.clone()),
        };

        Ok(ExecutorOutput {
            value: serde_json::json!({ "text": completion.text }),
            usage: Some(usage),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagforge_core::schema::IoSchema;
    use serde_json::json;
    use std::collections::HashMap;

    struct StubProvider;
    #[async_trait::async_trait]
    impl LlmProvider for StubProvider {
        async fn complete(
            &self,
            _model: &str,
            _provider: &str,
            prompt: &str,
            _temperature: Option<f32>,
            _max_tokens: Option<u32>,
        ) -> std::result::Result<LlmCompletion, String> {
            Ok(LlmCompletion {
                text: format!("echo: {prompt}"),
                tokens_in: 3,
                tokens_out: 5,
                cost_usd: 0.001,
            })
        }
    }

    fn node(prompt_template: &str) -> NodeConfig {
        NodeConfig {
            id: "n1".into(),
            name: None,
            dependencies: vec![],
            level: 0,
            input_mappings: HashMap::new(),
            output_mappings: HashMap::new(),
            input_schema: IoSchema::default(),
            output_schema: IoSchema::default(),
            use_cache: false,
            timeout_seconds: None,
            retry: Default::default(),
            kind: NodeKind::Llm {
                model: "gpt-test".into(),
                prompt_template: prompt_template.into(),
                temperature: None,
                max_tokens: None,
                provider: "stub".into(),
                llm_config: json!({}),
            },
        }
    }

    #[tokio::test]
    async fn renders_template_and_reports_usage() {
        let executor = LlmExecutor::new(Arc::new(StubProvider));
        let output = executor
            .invoke(&node("hello {{name}}"), json!({"name": "world"}))
            .await
            .unwrap();
        assert_eq!(output.value["text"], json!("echo: hello world"));
        assert_eq!(output.usage.unwrap().total_tokens(), 8);
    }
}
