//! Workflow Execution Engine — sequential graph walking over typed nodes.
//!
//! A workflow is a directed graph of `Node`s connected by `Edge`s. The
//! `ExecutionService` loads a workflow, creates an execution record, and
//! hands the graph to the walker, which runs one node at a time: dispatch
//! to the node-kind handler, append a log entry, merge the handler's
//! output into the shared context, and follow the resolved edge. A node
//! with no outgoing edge ends the run; any revisited node fails it.

pub mod context;
pub mod handlers;
pub mod http;
pub mod interpolate;
pub mod resolver;
pub mod service;
pub mod walker;

pub use context::{Context, ContextDelta};
pub use handlers::HandlerRegistry;
pub use http::ReqwestHttpClient;
pub use service::{ExecutionService, RunOutcome};
pub use walker::GraphWalker;
