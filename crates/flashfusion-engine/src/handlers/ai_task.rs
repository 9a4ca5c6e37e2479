use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use flashfusion_core::error::{EngineError, Result};
use flashfusion_core::traits::{LlmClient, LlmRequest};
use flashfusion_core::types::NodeKind;

use super::NodeHandler;
use crate::context::{Context, ContextDelta};
use crate::interpolate::interpolate;

/// Invokes the LLM with an interpolated prompt and stores the response
/// under the configured output variable.
pub struct AiTaskHandler {
    llm: Arc<dyn LlmClient>,
}

impl AiTaskHandler {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[derive(Deserialize)]
struct AiTaskConfig {
    prompt: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default, alias = "responseSchema", alias = "output_schema")]
    response_schema: Option<serde_json::Value>,
    #[serde(default, alias = "outputVariable")]
    output_variable: Option<String>,
}

impl NodeHandler for AiTaskHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::AiTask
    }

    fn execute(
        &self,
        config: serde_json::Value,
        context: Context,
    ) -> BoxFuture<'_, Result<ContextDelta>> {
        Box::pin(async move {
            let config: AiTaskConfig = serde_json::from_value(config)
                .map_err(|e| EngineError::Config(format!("invalid ai_task config: {}", e)))?;

            let prompt = interpolate(&config.prompt, &context);
            debug!(prompt_len = prompt.len(), "Invoking LLM for ai_task node");

            let response = self
                .llm
                .invoke(LlmRequest {
                    prompt,
                    model: config.model,
                    response_schema: config.response_schema,
                })
                .await?;

            let key = config
                .output_variable
                .unwrap_or_else(|| "ai_result".to_string());
            let mut delta = ContextDelta::new();
            delta.insert(key, response);
            Ok(delta)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashfusion_test_utils::StubLlmClient;
    use serde_json::json;

    #[tokio::test]
    async fn test_prompt_is_interpolated() {
        let llm = Arc::new(StubLlmClient::always(json!("a summary")));
        let handler = AiTaskHandler::new(llm.clone());

        let mut ctx = Context::new();
        ctx.set("topic", json!("Rust async"));

        let delta = handler
            .execute(json!({"prompt": "Summarize {{topic}}."}), ctx)
            .await
            .unwrap();

        assert_eq!(delta["ai_result"], json!("a summary"));
        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "Summarize Rust async.");
    }

    #[tokio::test]
    async fn test_custom_output_variable_and_model() {
        let llm = Arc::new(StubLlmClient::always(json!({"headline": "x"})));
        let handler = AiTaskHandler::new(llm.clone());

        let delta = handler
            .execute(
                json!({
                    "prompt": "Write a headline.",
                    "model": "ff-large",
                    "outputVariable": "headline",
                    "response_schema": {"type": "object"}
                }),
                Context::new(),
            )
            .await
            .unwrap();

        assert_eq!(delta["headline"], json!({"headline": "x"}));
        let requests = llm.requests();
        assert_eq!(requests[0].model.as_deref(), Some("ff-large"));
        assert!(requests[0].response_schema.is_some());
    }

    #[tokio::test]
    async fn test_llm_failure_propagates() {
        let llm = Arc::new(StubLlmClient::failing("HTTP 503: unavailable"));
        let handler = AiTaskHandler::new(llm);

        let err = handler
            .execute(json!({"prompt": "hi"}), Context::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Llm(_)));
    }

    #[tokio::test]
    async fn test_missing_prompt_is_config_error() {
        let llm = Arc::new(StubLlmClient::always(json!("x")));
        let handler = AiTaskHandler::new(llm);

        let err = handler.execute(json!({}), Context::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
