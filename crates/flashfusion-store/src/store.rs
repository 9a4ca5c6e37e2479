use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::debug;

use flashfusion_core::error::{EngineError, Result};
use flashfusion_core::traits::WorkflowStore;
use flashfusion_core::types::{
    Edge, ExecutionId, ExecutionOutcome, ExecutionStatus, LogEntry, Node, Workflow,
    WorkflowExecution, WorkflowId, WorkflowStats,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS workflows (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    definition TEXT NOT NULL,
    execution_count INTEGER NOT NULL DEFAULT 0,
    success_rate REAL NOT NULL DEFAULT 0,
    last_executed TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS executions (
    id TEXT PRIMARY KEY,
    workflow_id TEXT NOT NULL REFERENCES workflows(id),
    status TEXT NOT NULL,
    input_data TEXT NOT NULL,
    variables TEXT NOT NULL,
    execution_log TEXT NOT NULL,
    current_node TEXT,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    duration_ms INTEGER,
    output_data TEXT,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_executions_workflow
    ON executions(workflow_id, started_at);
";

/// Graph and variables of a workflow, stored as one JSON document.
/// Aggregate statistics live in their own columns so they survive
/// full-document replacement.
#[derive(Serialize, Deserialize)]
struct StoredDefinition {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    variables: HashMap<String, serde_json::Value>,
}

/// SQLite-backed workflow and execution store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EngineError::Database(format!("Failed to create db directory: {}", e))
            })?;
        }

        let conn =
            Connection::open(path).map_err(|e| EngineError::Database(e.to_string()))?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| EngineError::Database(e.to_string()))?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| EngineError::Database(e.to_string()))?;

        debug!(path = %path.display(), "SQLite store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| EngineError::Database(e.to_string()))?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| EngineError::Database(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_ts_opt(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_status(s: &str) -> ExecutionStatus {
    match s {
        "completed" => ExecutionStatus::Completed,
        "failed" => ExecutionStatus::Failed,
        _ => ExecutionStatus::Running,
    }
}

const SELECT_EXECUTION: &str = "SELECT id, workflow_id, status, input_data, variables,
        execution_log, current_node, started_at, completed_at, duration_ms,
        output_data, error_message
 FROM executions";

type ExecutionRow = (
    String,         // id
    String,         // workflow_id
    String,         // status
    String,         // input_data
    String,         // variables
    String,         // execution_log
    Option<String>, // current_node
    String,         // started_at
    Option<String>, // completed_at
    Option<i64>,    // duration_ms
    Option<String>, // output_data
    Option<String>, // error_message
);

fn execution_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExecutionRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
    ))
}

fn row_to_execution(row: ExecutionRow) -> Result<WorkflowExecution> {
    let (
        id,
        workflow_id,
        status,
        input_data,
        variables,
        execution_log,
        current_node,
        started_at,
        completed_at,
        duration_ms,
        output_data,
        error_message,
    ) = row;

    Ok(WorkflowExecution {
        id: ExecutionId::from_string(id),
        workflow_id: WorkflowId::from_string(workflow_id),
        status: parse_status(&status),
        input_data: serde_json::from_str(&input_data)?,
        variables: serde_json::from_str(&variables)?,
        execution_log: serde_json::from_str(&execution_log)?,
        current_node,
        started_at: parse_ts(&started_at),
        completed_at: completed_at.as_deref().and_then(parse_ts_opt),
        duration_ms: duration_ms.map(|d| d as u64),
        output_data: output_data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        error_message,
    })
}

type WorkflowRow = (
    String,         // id
    String,         // name
    String,         // definition
    i64,            // execution_count
    f64,            // success_rate
    Option<String>, // last_executed
    String,         // created_at
    String,         // updated_at
);

fn row_to_workflow(row: WorkflowRow) -> Result<Workflow> {
    let (id, name, definition, count, rate, last, created, updated) = row;
    let def: StoredDefinition = serde_json::from_str(&definition)?;
    Ok(Workflow {
        id: WorkflowId::from_string(id),
        name,
        nodes: def.nodes,
        edges: def.edges,
        variables: def.variables,
        stats: WorkflowStats {
            execution_count: count as u64,
            success_rate: rate,
            last_executed: last.as_deref().and_then(parse_ts_opt),
        },
        created_at: parse_ts(&created),
        updated_at: parse_ts(&updated),
    })
}

impl WorkflowStore for SqliteStore {
    fn load_workflow(&self, id: &WorkflowId) -> BoxFuture<'_, Result<Option<Workflow>>> {
        let id = id.clone();

        Box::pin(async move {
            let conn = self
                .conn
                .lock()
                .map_err(|e| EngineError::Database(e.to_string()))?;

            let row = conn
                .query_row(
                    "SELECT id, name, definition, execution_count, success_rate,
                            last_executed, created_at, updated_at
                     FROM workflows WHERE id = ?1",
                    params![id.0],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                            row.get(7)?,
                        ))
                    },
                )
                .optional()
                .map_err(|e| EngineError::Database(e.to_string()))?;

            row.map(row_to_workflow).transpose()
        })
    }

    fn save_workflow(&self, workflow: &Workflow) -> BoxFuture<'_, Result<()>> {
        let workflow = workflow.clone();

        Box::pin(async move {
            let definition = serde_json::to_string(&StoredDefinition {
                nodes: workflow.nodes,
                edges: workflow.edges,
                variables: workflow.variables,
            })?;

            let conn = self
                .conn
                .lock()
                .map_err(|e| EngineError::Database(e.to_string()))?;

            conn.execute(
                "INSERT INTO workflows (id, name, definition, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     definition = excluded.definition,
                     updated_at = excluded.updated_at",
                params![
                    workflow.id.0,
                    workflow.name,
                    definition,
                    workflow.created_at.to_rfc3339(),
                    workflow.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| EngineError::Database(e.to_string()))?;

            Ok(())
        })
    }

    fn list_workflows(&self) -> BoxFuture<'_, Result<Vec<Workflow>>> {
        Box::pin(async move {
            let conn = self
                .conn
                .lock()
                .map_err(|e| EngineError::Database(e.to_string()))?;

            let mut stmt = conn
                .prepare(
                    "SELECT id, name, definition, execution_count, success_rate,
                            last_executed, created_at, updated_at
                     FROM workflows ORDER BY name ASC",
                )
                .map_err(|e| EngineError::Database(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                    ))
                })
                .map_err(|e| EngineError::Database(e.to_string()))?;

            let mut workflows = Vec::new();
            for row in rows {
                let row = row.map_err(|e| EngineError::Database(e.to_string()))?;
                workflows.push(row_to_workflow(row)?);
            }
            Ok(workflows)
        })
    }

    fn create_execution(&self, execution: &WorkflowExecution) -> BoxFuture<'_, Result<()>> {
        let execution = execution.clone();

        Box::pin(async move {
            let input_data = serde_json::to_string(&execution.input_data)?;
            let variables = serde_json::to_string(&execution.variables)?;
            let execution_log = serde_json::to_string(&execution.execution_log)?;
            let output_data = execution
                .output_data
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            let conn = self
                .conn
                .lock()
                .map_err(|e| EngineError::Database(e.to_string()))?;

            conn.execute(
                "INSERT INTO executions (id, workflow_id, status, input_data, variables,
                                         execution_log, current_node, started_at,
                                         completed_at, duration_ms, output_data, error_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    execution.id.0,
                    execution.workflow_id.0,
                    execution.status.to_string(),
                    input_data,
                    variables,
                    execution_log,
                    execution.current_node,
                    execution.started_at.to_rfc3339(),
                    execution.completed_at.map(|t| t.to_rfc3339()),
                    execution.duration_ms.map(|d| d as i64),
                    output_data,
                    execution.error_message,
                ],
            )
            .map_err(|e| EngineError::Database(e.to_string()))?;

            Ok(())
        })
    }

    fn load_execution(
        &self,
        id: &ExecutionId,
    ) -> BoxFuture<'_, Result<Option<WorkflowExecution>>> {
        let id = id.clone();

        Box::pin(async move {
            let conn = self
                .conn
                .lock()
                .map_err(|e| EngineError::Database(e.to_string()))?;

            let row = conn
                .query_row(
                    &format!("{} WHERE id = ?1", SELECT_EXECUTION),
                    params![id.0],
                    execution_row,
                )
                .optional()
                .map_err(|e| EngineError::Database(e.to_string()))?;

            row.map(row_to_execution).transpose()
        })
    }

    fn list_executions(
        &self,
        workflow_id: &WorkflowId,
    ) -> BoxFuture<'_, Result<Vec<WorkflowExecution>>> {
        let workflow_id = workflow_id.clone();

        Box::pin(async move {
            let conn = self
                .conn
                .lock()
                .map_err(|e| EngineError::Database(e.to_string()))?;

            let mut stmt = conn
                .prepare(&format!(
                    "{} WHERE workflow_id = ?1 ORDER BY started_at DESC",
                    SELECT_EXECUTION
                ))
                .map_err(|e| EngineError::Database(e.to_string()))?;

            let rows = stmt
                .query_map(params![workflow_id.0], execution_row)
                .map_err(|e| EngineError::Database(e.to_string()))?;

            let mut executions = Vec::new();
            for row in rows {
                let row = row.map_err(|e| EngineError::Database(e.to_string()))?;
                executions.push(row_to_execution(row)?);
            }
            Ok(executions)
        })
    }

    fn append_log_entry(
        &self,
        id: &ExecutionId,
        entry: &LogEntry,
        current_node: &str,
    ) -> BoxFuture<'_, Result<()>> {
        let id = id.clone();
        let entry = entry.clone();
        let current_node = current_node.to_string();

        Box::pin(async move {
            // Read-modify-write of the embedded log. Safe under the
            // single-writer-per-execution regime; the connection mutex is
            // held across both statements.
            let conn = self
                .conn
                .lock()
                .map_err(|e| EngineError::Database(e.to_string()))?;

            let raw: String = conn
                .query_row(
                    "SELECT execution_log FROM executions WHERE id = ?1",
                    params![id.0],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| EngineError::Database(e.to_string()))?
                .ok_or_else(|| EngineError::Database(format!("execution not found: {}", id)))?;

            let mut log: Vec<LogEntry> = serde_json::from_str(&raw)?;
            log.push(entry);
            let raw = serde_json::to_string(&log)?;

            conn.execute(
                "UPDATE executions SET execution_log = ?1, current_node = ?2 WHERE id = ?3",
                params![raw, current_node, id.0],
            )
            .map_err(|e| EngineError::Database(e.to_string()))?;

            Ok(())
        })
    }

    fn finalize_execution(
        &self,
        id: &ExecutionId,
        outcome: &ExecutionOutcome,
    ) -> BoxFuture<'_, Result<()>> {
        let id = id.clone();
        let outcome = outcome.clone();

        Box::pin(async move {
            let output_data = outcome
                .output_data
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            let conn = self
                .conn
                .lock()
                .map_err(|e| EngineError::Database(e.to_string()))?;

            let changed = conn
                .execute(
                    "UPDATE executions SET status = ?1, completed_at = ?2, duration_ms = ?3,
                                           output_data = ?4, error_message = ?5
                     WHERE id = ?6",
                    params![
                        outcome.status.to_string(),
                        Utc::now().to_rfc3339(),
                        outcome.duration_ms as i64,
                        output_data,
                        outcome.error_message,
                        id.0,
                    ],
                )
                .map_err(|e| EngineError::Database(e.to_string()))?;

            if changed == 0 {
                return Err(EngineError::Database(format!("execution not found: {}", id)));
            }
            Ok(())
        })
    }

    fn record_outcome(
        &self,
        workflow_id: &WorkflowId,
        succeeded: bool,
    ) -> BoxFuture<'_, Result<()>> {
        let workflow_id = workflow_id.clone();

        Box::pin(async move {
            let conn = self
                .conn
                .lock()
                .map_err(|e| EngineError::Database(e.to_string()))?;

            // One statement so concurrent runs cannot clobber each other:
            // every right-hand side reads the pre-update row.
            let changed = conn
                .execute(
                    "UPDATE workflows SET
                         success_rate = (success_rate * execution_count + ?1)
                                        / (execution_count + 1),
                         execution_count = execution_count + 1,
                         last_executed = ?2
                     WHERE id = ?3",
                    params![
                        if succeeded { 1.0 } else { 0.0 },
                        Utc::now().to_rfc3339(),
                        workflow_id.0,
                    ],
                )
                .map_err(|e| EngineError::Database(e.to_string()))?;

            if changed == 0 {
                return Err(EngineError::Database(format!(
                    "workflow not found: {}",
                    workflow_id
                )));
            }
            Ok(())
        })
    }
}
