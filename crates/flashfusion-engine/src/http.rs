use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use flashfusion_core::config::HttpConfig;
use flashfusion_core::error::{EngineError, Result};
use flashfusion_core::traits::{HttpClient, HttpRequest, HttpResponse};

/// reqwest-backed HTTP collaborator for `api_call` nodes.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| EngineError::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestHttpClient {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse>> {
        Box::pin(async move {
            let method = reqwest::Method::from_bytes(request.method.as_bytes())
                .map_err(|_| EngineError::Http(format!("invalid method '{}'", request.method)))?;

            debug!(method = %method, url = %request.url, "Sending HTTP request");

            let mut req = self.client.request(method, &request.url);
            for (name, value) in &request.headers {
                req = req.header(name.as_str(), value.as_str());
            }
            if let Some(body) = request.body {
                req = req.body(body);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| EngineError::Http(format!("request failed: {}", e)))?;

            let status = resp.status().as_u16();
            let text = resp
                .text()
                .await
                .map_err(|e| EngineError::Http(format!("failed to read response body: {}", e)))?;

            // JSON bodies parse to structured values; anything else is
            // carried as a string, empty bodies as null.
            let body = if text.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            };

            Ok(HttpResponse { status, body })
        })
    }
}
