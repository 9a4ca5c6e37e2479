use std::collections::{HashMap, HashSet};
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info};

use flashfusion_core::error::{EngineError, Result};
use flashfusion_core::traits::WorkflowStore;
use flashfusion_core::types::{Edge, ExecutionId, LogEntry, Node, NodeKind};

use crate::context::Context;
use crate::handlers::HandlerRegistry;
use crate::resolver;

/// Walks a workflow graph one node at a time.
///
/// Starting from the unique trigger node, each step dispatches to the
/// node-kind handler, appends a log entry to the execution record, merges
/// the handler's delta into the context, and follows the resolved edge.
/// Reaching a node with no outgoing edge ends the walk as success;
/// revisiting any node fails it.
pub struct GraphWalker<'a> {
    registry: &'a HandlerRegistry,
    store: &'a dyn WorkflowStore,
}

impl<'a> GraphWalker<'a> {
    pub fn new(registry: &'a HandlerRegistry, store: &'a dyn WorkflowStore) -> Self {
        Self { registry, store }
    }

    /// Walk the graph, returning the final context.
    pub async fn run(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        execution_id: &ExecutionId,
        seed: HashMap<String, Value>,
    ) -> Result<Context> {
        let mut triggers = nodes.iter().filter(|n| n.kind == NodeKind::Trigger);
        let trigger = triggers.next().ok_or(EngineError::MissingTrigger)?;
        let extra = triggers.count();
        if extra > 0 {
            return Err(EngineError::MultipleTriggers(extra + 1));
        }

        let node_map: HashMap<&str, &Node> =
            nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut context = Context::from_map(seed);
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = trigger;

        loop {
            if !visited.insert(current.id.clone()) {
                return Err(EngineError::CircularDependency(current.id.clone()));
            }

            info!(node_id = %current.id, kind = %current.kind, "Executing workflow node");

            let started = Instant::now();
            let result = match self.registry.get(&current.kind) {
                Some(handler) => {
                    handler
                        .execute(current.data.config.clone(), context.clone())
                        .await
                }
                None => Err(EngineError::UnknownNodeType(current.kind.to_string())),
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            let delta = match result {
                Ok(delta) => delta,
                Err(e) => {
                    let entry = LogEntry::failed(current.id.as_str(), e.to_string(), duration_ms);
                    self.store
                        .append_log_entry(execution_id, &entry, &current.id)
                        .await?;
                    // Dispatch misses keep their own error type; handler
                    // failures are wrapped with the offending node id.
                    return Err(match e {
                        EngineError::UnknownNodeType(_) => e,
                        other => EngineError::NodeExecution {
                            node_id: current.id.clone(),
                            message: other.to_string(),
                        },
                    });
                }
            };

            let entry = LogEntry::completed(
                current.id.as_str(),
                Value::Object(delta.clone()),
                duration_ms,
            );
            self.store
                .append_log_entry(execution_id, &entry, &current.id)
                .await?;

            debug!(node_id = %current.id, duration_ms, "Node execution complete");

            context.apply_delta(&delta);

            match resolver::find_next_edge(edges, &current.id, &delta) {
                Some(edge) => {
                    current = node_map.get(edge.target.as_str()).copied().ok_or_else(|| {
                        EngineError::Config(format!(
                            "edge target '{}' not found in graph",
                            edge.target
                        ))
                    })?;
                }
                None => {
                    debug!(node_id = %current.id, "No outgoing edge, workflow complete");
                    break;
                }
            }
        }

        Ok(context)
    }
}
