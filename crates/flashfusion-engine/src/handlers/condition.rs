use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use flashfusion_core::error::{EngineError, Result};
use flashfusion_core::expr;
use flashfusion_core::types::NodeKind;

use super::NodeHandler;
use crate::context::{Context, ContextDelta};

/// Evaluates a boolean expression against the context. The result feeds
/// the edge resolver's branch selection.
pub struct ConditionHandler;

#[derive(Deserialize)]
struct ConditionConfig {
    expression: String,
}

impl NodeHandler for ConditionHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::Condition
    }

    fn execute(
        &self,
        config: serde_json::Value,
        context: Context,
    ) -> BoxFuture<'_, Result<ContextDelta>> {
        Box::pin(async move {
            let config: ConditionConfig = serde_json::from_value(config)
                .map_err(|e| EngineError::Config(format!("invalid condition config: {}", e)))?;

            let result = expr::evaluate_bool(&config.expression, context.data())?;
            debug!(expression = %config.expression, result, "Evaluated condition");

            let mut delta = ContextDelta::new();
            delta.insert("condition_result".to_string(), Value::Bool(result));
            Ok(delta)
        })
    }
}
