use std::collections::HashMap;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::*;

/// A single LLM invocation request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub prompt: String,
    /// Model override; the client default applies when absent.
    pub model: Option<String>,
    /// JSON Schema the response must match. Free text when absent.
    pub response_schema: Option<serde_json::Value>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            response_schema: None,
        }
    }
}

/// LLM invocation collaborator.
pub trait LlmClient: Send + Sync + 'static {
    /// Invoke the model and return the response as a JSON value:
    /// structured when a schema was given, a JSON string otherwise.
    fn invoke(&self, request: LlmRequest) -> BoxFuture<'_, Result<serde_json::Value>>;
}

/// An outbound HTTP request issued by an `api_call` node.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            headers: HashMap::new(),
            body: None,
        }
    }
}

/// Response to an `api_call` request. Non-JSON bodies are carried as a
/// JSON string; empty bodies as null.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

/// Outbound HTTP collaborator.
pub trait HttpClient: Send + Sync + 'static {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse>>;
}

/// Persistence collaborator for workflows and executions.
///
/// Any keyed store with read-modify-write works; the engine assumes a
/// single writer per execution row.
pub trait WorkflowStore: Send + Sync + 'static {
    /// Load a workflow by id.
    fn load_workflow(&self, id: &WorkflowId) -> BoxFuture<'_, Result<Option<Workflow>>>;

    /// Save a workflow by full-document replacement. Aggregate statistics
    /// are owned by the store and survive replacement.
    fn save_workflow(&self, workflow: &Workflow) -> BoxFuture<'_, Result<()>>;

    /// List all workflows.
    fn list_workflows(&self) -> BoxFuture<'_, Result<Vec<Workflow>>>;

    /// Insert a fresh execution row.
    fn create_execution(&self, execution: &WorkflowExecution) -> BoxFuture<'_, Result<()>>;

    /// Load an execution by id.
    fn load_execution(&self, id: &ExecutionId) -> BoxFuture<'_, Result<Option<WorkflowExecution>>>;

    /// List a workflow's executions, most recent first.
    fn list_executions(
        &self,
        workflow_id: &WorkflowId,
    ) -> BoxFuture<'_, Result<Vec<WorkflowExecution>>>;

    /// Append one log entry and advance `current_node`.
    fn append_log_entry(
        &self,
        id: &ExecutionId,
        entry: &LogEntry,
        current_node: &str,
    ) -> BoxFuture<'_, Result<()>>;

    /// Apply the terminal status, output/error, and duration of a run.
    fn finalize_execution(
        &self,
        id: &ExecutionId,
        outcome: &ExecutionOutcome,
    ) -> BoxFuture<'_, Result<()>>;

    /// Fold one run outcome into the workflow's aggregate statistics.
    /// Must be atomic with respect to concurrent runs of the same workflow.
    fn record_outcome(&self, workflow_id: &WorkflowId, succeeded: bool)
        -> BoxFuture<'_, Result<()>>;
}
