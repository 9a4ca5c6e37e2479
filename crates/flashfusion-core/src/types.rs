use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique workflow identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one run of a workflow.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExecutionId(pub String);

impl ExecutionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The type of a workflow node.
///
/// Unknown type strings are preserved rather than rejected at decode time,
/// so a stored workflow with a bad node type fails at dispatch with
/// `UnknownNodeType` instead of failing to load.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Trigger,
    AiTask,
    ApiCall,
    Condition,
    Transform,
    End,
    #[serde(untagged)]
    Other(String),
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trigger => write!(f, "trigger"),
            Self::AiTask => write!(f, "ai_task"),
            Self::ApiCall => write!(f, "api_call"),
            Self::Condition => write!(f, "condition"),
            Self::Transform => write!(f, "transform"),
            Self::End => write!(f, "end"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Canvas position of a node. Layout only, ignored by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Payload attached to a node. The `config` shape depends on the node kind;
/// each handler deserializes its own typed view of it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default)]
    pub config: serde_json::Value,
}

/// A step in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within the workflow.
    pub id: String,
    /// Node type, drives handler dispatch.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Type-specific configuration.
    #[serde(default)]
    pub data: NodeData,
    /// Builder canvas position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            data: NodeData::default(),
            position: None,
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.data.config = config;
        self
    }
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    /// Branch label on condition nodes (`"true"` / `"false"`).
    #[serde(default, alias = "sourceHandle", skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: None,
        }
    }

    /// Create a labeled branch edge out of a condition node.
    pub fn branch(
        source: impl Into<String>,
        target: impl Into<String>,
        handle: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: Some(handle.into()),
        }
    }
}

/// Aggregate run statistics for a workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStats {
    #[serde(default)]
    pub execution_count: u64,
    /// Rolling fraction of successful runs, in `[0, 1]`.
    #[serde(default)]
    pub success_rate: f64,
    #[serde(default)]
    pub last_executed: Option<DateTime<Utc>>,
}

/// A named, versioned directed graph of nodes and edges.
///
/// Workflows are mutated only by full-document replacement and are never
/// hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Initial key→value map seeding every run's context.
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub stats: WorkflowStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::new(),
            name: name.into(),
            nodes: vec![],
            edges: vec![],
            variables: HashMap::new(),
            stats: WorkflowStats::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_nodes(mut self, nodes: Vec<Node>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_edges(mut self, edges: Vec<Edge>) -> Self {
        self.edges = edges;
        self
    }

    pub fn with_variables(mut self, variables: HashMap<String, serde_json::Value>) -> Self {
        self.variables = variables;
        self
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of a single node run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Failed,
}

/// Immutable record appended to an execution's log after every node run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: StepStatus,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl LogEntry {
    pub fn completed(node_id: impl Into<String>, output: serde_json::Value, duration_ms: u64) -> Self {
        Self {
            node_id: node_id.into(),
            timestamp: Utc::now(),
            status: StepStatus::Completed,
            output: Some(output),
            error: None,
            duration_ms,
        }
    }

    pub fn failed(node_id: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            node_id: node_id.into(),
            timestamp: Utc::now(),
            status: StepStatus::Failed,
            output: None,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

/// One run of a workflow.
///
/// Owned exclusively by the engine while `status` is `Running`; read-only
/// afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub input_data: HashMap<String, serde_json::Value>,
    /// Live context, seeded from workflow variables plus input data.
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub execution_log: Vec<LogEntry>,
    #[serde(default)]
    pub current_node: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub output_data: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl WorkflowExecution {
    /// Create a fresh `Running` execution for a workflow.
    pub fn start(
        workflow_id: WorkflowId,
        input_data: HashMap<String, serde_json::Value>,
        variables: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: ExecutionId::new(),
            workflow_id,
            status: ExecutionStatus::Running,
            input_data,
            variables,
            execution_log: vec![],
            current_node: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            output_data: None,
            error_message: None,
        }
    }
}

/// Terminal update applied to an execution row when a run finishes.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    pub output_data: Option<HashMap<String, serde_json::Value>>,
    pub error_message: Option<String>,
    pub duration_ms: u64,
}

impl ExecutionOutcome {
    pub fn completed(output_data: HashMap<String, serde_json::Value>, duration_ms: u64) -> Self {
        Self {
            status: ExecutionStatus::Completed,
            output_data: Some(output_data),
            error_message: None,
            duration_ms,
        }
    }

    pub fn failed(error_message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            output_data: None,
            error_message: Some(error_message.into()),
            duration_ms,
        }
    }
}
