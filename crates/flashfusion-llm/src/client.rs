use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use flashfusion_core::config::LlmConfig;
use flashfusion_core::error::{EngineError, Result};
use flashfusion_core::traits::{LlmClient, LlmRequest};

/// Client for the hosted invoke endpoint.
///
/// The endpoint takes a prompt, a model id, and an optional response
/// schema; it answers with the structured value when a schema was given
/// and with free text otherwise.
pub struct InvokeClient {
    http: Client,
    endpoint: String,
    default_model: String,
    api_key: Option<String>,
}

impl InvokeClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Llm(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            default_model: config.model.clone(),
            api_key: config.api_key(),
        })
    }
}

#[derive(Serialize)]
struct InvokeBody<'a> {
    prompt: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a serde_json::Value>,
}

impl LlmClient for InvokeClient {
    fn invoke(&self, request: LlmRequest) -> BoxFuture<'_, Result<serde_json::Value>> {
        Box::pin(async move {
            let model = request.model.as_deref().unwrap_or(&self.default_model);
            let body = InvokeBody {
                prompt: &request.prompt,
                model,
                response_schema: request.response_schema.as_ref(),
            };

            debug!(model, prompt_len = request.prompt.len(), "Invoking LLM");

            let mut req = self.http.post(&self.endpoint).json(&body);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| EngineError::Llm(format!("request failed: {}", e)))?;

            let status = resp.status();
            let text = resp
                .text()
                .await
                .map_err(|e| EngineError::Llm(format!("failed to read response body: {}", e)))?;

            if !status.is_success() {
                return Err(EngineError::Llm(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    truncate(&text, 200)
                )));
            }

            // Structured responses come back as JSON; free text as-is.
            Ok(serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)))
        })
    }
}

fn truncate(s: &str, max_len: usize) -> &str {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
