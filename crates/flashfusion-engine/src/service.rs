use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{error, info, warn};

use flashfusion_core::error::{EngineError, Result};
use flashfusion_core::traits::{HttpClient, LlmClient, WorkflowStore};
use flashfusion_core::types::{ExecutionId, ExecutionOutcome, WorkflowExecution, WorkflowId};

use crate::handlers::HandlerRegistry;
use crate::walker::GraphWalker;

/// Result of a successful workflow run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub execution_id: ExecutionId,
    /// The final context: the seed variables plus every node's output.
    pub output: HashMap<String, Value>,
}

/// Runs workflows end to end: load, execute, persist, account.
///
/// All collaborators are injected; the service holds no ambient state
/// beyond its handler registry.
pub struct ExecutionService {
    store: Arc<dyn WorkflowStore>,
    registry: HandlerRegistry,
}

impl ExecutionService {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        llm: Arc<dyn LlmClient>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            store,
            registry: HandlerRegistry::new(llm, http),
        }
    }

    /// Execute a workflow with the given input data.
    ///
    /// The run's context is seeded with the workflow's variables
    /// overlaid by `input_data`. On success the execution record is
    /// finalized as completed with the final context as output; on
    /// failure it is finalized as failed and the error propagates.
    /// Aggregate statistics are updated best-effort either way.
    pub async fn execute_workflow(
        &self,
        workflow_id: &WorkflowId,
        input_data: HashMap<String, Value>,
    ) -> Result<RunOutcome> {
        let workflow = self
            .store
            .load_workflow(workflow_id)
            .await?
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;

        let mut variables = workflow.variables.clone();
        variables.extend(input_data.clone());

        let execution =
            WorkflowExecution::start(workflow.id.clone(), input_data, variables.clone());
        self.store.create_execution(&execution).await?;

        info!(
            workflow_id = %workflow.id,
            execution_id = %execution.id,
            name = %workflow.name,
            "Starting workflow execution"
        );

        let started = Instant::now();
        let walker = GraphWalker::new(&self.registry, self.store.as_ref());
        let result = walker
            .run(&workflow.nodes, &workflow.edges, &execution.id, variables)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(context) => {
                let output = context.into_map();
                self.store
                    .finalize_execution(
                        &execution.id,
                        &ExecutionOutcome::completed(output.clone(), duration_ms),
                    )
                    .await?;
                self.record_outcome(&workflow.id, true).await;

                info!(
                    execution_id = %execution.id,
                    duration_ms,
                    "Workflow execution completed"
                );
                Ok(RunOutcome {
                    execution_id: execution.id,
                    output,
                })
            }
            Err(e) => {
                // A store failure here must not mask the run's own error.
                if let Err(store_err) = self
                    .store
                    .finalize_execution(
                        &execution.id,
                        &ExecutionOutcome::failed(e.to_string(), duration_ms),
                    )
                    .await
                {
                    error!(
                        execution_id = %execution.id,
                        error = %store_err,
                        "Failed to persist failed execution state"
                    );
                }
                self.record_outcome(&workflow.id, false).await;

                info!(
                    execution_id = %execution.id,
                    duration_ms,
                    error = %e,
                    "Workflow execution failed"
                );
                Err(e)
            }
        }
    }

    /// Fold the run outcome into the workflow's aggregate statistics.
    /// Best-effort: a failure is logged and never masks the run result.
    async fn record_outcome(&self, workflow_id: &WorkflowId, succeeded: bool) {
        if let Err(e) = self.store.record_outcome(workflow_id, succeeded).await {
            warn!(
                workflow_id = %workflow_id,
                error = %e,
                "Failed to update workflow statistics"
            );
        }
    }
}
