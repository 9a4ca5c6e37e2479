use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    // Graph errors
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Workflow has no trigger node")]
    MissingTrigger,

    #[error("Workflow has {0} trigger nodes, expected exactly one")]
    MultipleTriggers(usize),

    #[error("Circular dependency: node '{0}' was already visited")]
    CircularDependency(String),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Node '{node_id}' failed: {message}")]
    NodeExecution { node_id: String, message: String },

    // Expression errors
    #[error("Expression '{expression}' failed: {message}")]
    ExpressionEvaluation { expression: String, message: String },

    // Transform errors
    #[error("Transform error: {0}")]
    Transform(String),

    // LLM errors
    #[error("LLM request failed: {0}")]
    Llm(String),

    // HTTP errors
    #[error("HTTP request failed: {0}")]
    Http(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
