//! Per-node-kind handlers — the dispatch table behind the graph walker.
//!
//! Each handler is a function of (config, context) to a context delta.
//! Handlers deserialize their own typed view of `node.data.config` and
//! never mutate the context directly; the walker merges the delta.

mod ai_task;
mod api_call;
mod condition;
mod transform;

pub use ai_task::AiTaskHandler;
pub use api_call::ApiCallHandler;
pub use condition::ConditionHandler;
pub use transform::TransformHandler;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;

use flashfusion_core::error::Result;
use flashfusion_core::traits::{HttpClient, LlmClient};
use flashfusion_core::types::NodeKind;

use crate::context::{Context, ContextDelta};

/// A node handler: performs one node's work and returns a context delta.
pub trait NodeHandler: Send + Sync {
    /// Node kind this handler serves.
    fn kind(&self) -> NodeKind;

    /// Execute the node with its configuration and a snapshot of the
    /// run context.
    fn execute(
        &self,
        config: serde_json::Value,
        context: Context,
    ) -> BoxFuture<'_, Result<ContextDelta>>;
}

/// Trigger nodes start the walk and pass the context through unchanged.
pub struct TriggerHandler;

impl NodeHandler for TriggerHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::Trigger
    }

    fn execute(
        &self,
        _config: serde_json::Value,
        _context: Context,
    ) -> BoxFuture<'_, Result<ContextDelta>> {
        Box::pin(async { Ok(ContextDelta::new()) })
    }
}

/// End nodes pass the context through unchanged and mark terminal success.
pub struct EndHandler;

impl NodeHandler for EndHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::End
    }

    fn execute(
        &self,
        _config: serde_json::Value,
        _context: Context,
    ) -> BoxFuture<'_, Result<ContextDelta>> {
        Box::pin(async { Ok(ContextDelta::new()) })
    }
}

/// Registry of handlers for the known node kinds.
///
/// A node kind with no registered handler fails dispatch with
/// `UnknownNodeType`.
pub struct HandlerRegistry {
    handlers: HashMap<NodeKind, Box<dyn NodeHandler>>,
}

impl HandlerRegistry {
    /// Create a registry with all built-in handlers registered.
    pub fn new(llm: Arc<dyn LlmClient>, http: Arc<dyn HttpClient>) -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };
        registry.register(TriggerHandler);
        registry.register(AiTaskHandler::new(llm));
        registry.register(ApiCallHandler::new(http));
        registry.register(ConditionHandler);
        registry.register(TransformHandler);
        registry.register(EndHandler);
        registry
    }

    /// Register a handler, replacing any existing one for its kind.
    pub fn register(&mut self, handler: impl NodeHandler + 'static) {
        self.handlers.insert(handler.kind(), Box::new(handler));
    }

    /// Get the handler for a node kind.
    pub fn get(&self, kind: &NodeKind) -> Option<&dyn NodeHandler> {
        self.handlers.get(kind).map(|h| h.as_ref())
    }
}
