use std::collections::HashMap;

use serde_json::Value;

use flashfusion_core::expr;

/// Output of a node handler, merged into the context after the node
/// completes and logged as the node's output.
pub type ContextDelta = serde_json::Map<String, Value>;

/// The mutable key→value map threaded through a single workflow run.
///
/// Seeded from the workflow's variables plus the run input; each node's
/// delta is merged in with later keys winning on conflict.
#[derive(Debug, Clone, Default)]
pub struct Context {
    data: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(data: HashMap<String, Value>) -> Self {
        Self { data }
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Get a value as a string, if it's a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Set a value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// Merge a node's delta into the context. Last write wins.
    pub fn apply_delta(&mut self, delta: &ContextDelta) {
        for (key, value) in delta {
            self.data.insert(key.clone(), value.clone());
        }
    }

    /// Resolve a dotted path (`user.name`) against the context.
    pub fn resolve_path(&self, path: &str) -> Option<&Value> {
        expr::lookup_path(&self.data, path)
    }

    /// The underlying data map.
    pub fn data(&self) -> &HashMap<String, Value> {
        &self.data
    }

    pub fn into_map(self) -> HashMap<String, Value> {
        self.data
    }
}
