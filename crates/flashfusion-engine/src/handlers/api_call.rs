use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use flashfusion_core::error::{EngineError, Result};
use flashfusion_core::traits::{HttpClient, HttpRequest};
use flashfusion_core::types::NodeKind;

use super::NodeHandler;
use crate::context::{Context, ContextDelta};
use crate::interpolate::interpolate;

/// Issues an outbound HTTP request and stores the parsed response body
/// plus the status code in the context.
pub struct ApiCallHandler {
    http: Arc<dyn HttpClient>,
}

impl ApiCallHandler {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }
}

#[derive(Deserialize)]
struct ApiCallConfig {
    endpoint: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
    /// JSON body template, interpolated for non-GET requests.
    #[serde(default)]
    body: Option<String>,
    #[serde(default, alias = "outputVariable")]
    output_variable: Option<String>,
}

impl NodeHandler for ApiCallHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::ApiCall
    }

    fn execute(
        &self,
        config: serde_json::Value,
        context: Context,
    ) -> BoxFuture<'_, Result<ContextDelta>> {
        Box::pin(async move {
            let config: ApiCallConfig = serde_json::from_value(config)
                .map_err(|e| EngineError::Config(format!("invalid api_call config: {}", e)))?;

            let url = interpolate(&config.endpoint, &context);
            let method = config
                .method
                .map(|m| m.to_uppercase())
                .unwrap_or_else(|| "GET".to_string());
            let body = if method == "GET" {
                None
            } else {
                config.body.map(|b| interpolate(&b, &context))
            };

            debug!(%method, %url, "Issuing api_call request");

            let response = self
                .http
                .send(HttpRequest {
                    method,
                    url,
                    headers: config.headers,
                    body,
                })
                .await?;

            let key = config
                .output_variable
                .unwrap_or_else(|| "api_result".to_string());
            let mut delta = ContextDelta::new();
            delta.insert(key, response.body);
            delta.insert("api_status".to_string(), Value::from(response.status));
            Ok(delta)
        })
    }
}
