//! Shared test fixtures: scripted stub collaborators and workflow
//! builders used across the FlashFusion crates' tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use futures::future::BoxFuture;
use serde_json::Value;

use flashfusion_core::error::{EngineError, Result};
use flashfusion_core::traits::{HttpClient, HttpRequest, HttpResponse, LlmClient, LlmRequest};
use flashfusion_core::types::{Edge, Node, NodeKind, Workflow};

/// Initialize tracing for tests. Safe to call more than once.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

type Scripted<T> = std::result::Result<T, String>;

/// Stub LLM client. Answers with a scripted sequence, then the fallback;
/// records every request it sees.
pub struct StubLlmClient {
    script: Mutex<VecDeque<Scripted<Value>>>,
    fallback: Scripted<Value>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl StubLlmClient {
    /// Answer every invocation with the same value.
    pub fn always(value: Value) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(value),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail every invocation with the same message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Err(message.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer with the given responses in order, then fail.
    pub fn scripted(responses: Vec<Scripted<Value>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            fallback: Err("script exhausted".to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// The requests seen so far.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl LlmClient for StubLlmClient {
    fn invoke(&self, request: LlmRequest) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());
            next.map_err(EngineError::Llm)
        })
    }
}

/// Stub HTTP client. Mirrors `StubLlmClient` for `api_call` nodes.
pub struct StubHttpClient {
    script: Mutex<VecDeque<Scripted<(u16, Value)>>>,
    fallback: Scripted<(u16, Value)>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubHttpClient {
    /// Answer every request with the same status and body.
    pub fn always(status: u16, body: Value) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok((status, body)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail every request with the same message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Err(message.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer with the given responses in order, then fail.
    pub fn scripted(responses: Vec<Scripted<(u16, Value)>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            fallback: Err("script exhausted".to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// The requests seen so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpClient for StubHttpClient {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());
            next.map(|(status, body)| HttpResponse { status, body })
                .map_err(EngineError::Http)
        })
    }
}

/// A trigger node.
pub fn trigger(id: &str) -> Node {
    Node::new(id, NodeKind::Trigger)
}

/// An end node.
pub fn end(id: &str) -> Node {
    Node::new(id, NodeKind::End)
}

/// A condition node over the given expression.
pub fn condition(id: &str, expression: &str) -> Node {
    Node::new(id, NodeKind::Condition)
        .with_config(serde_json::json!({ "expression": expression }))
}

/// A workflow over the given graph.
pub fn workflow(name: &str, nodes: Vec<Node>, edges: Vec<Edge>) -> Workflow {
    Workflow::new(name).with_nodes(nodes).with_edges(edges)
}
