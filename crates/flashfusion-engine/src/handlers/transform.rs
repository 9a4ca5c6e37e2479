use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use flashfusion_core::error::{EngineError, Result};
use flashfusion_core::expr;
use flashfusion_core::types::NodeKind;

use super::NodeHandler;
use crate::context::{Context, ContextDelta};

/// Reshapes context data: `map`/`filter` evaluate an expression per
/// element of an array variable (the element is bound as `item`), `merge`
/// shallow-merges named context keys.
pub struct TransformHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TransformOp {
    Map,
    Filter,
    Merge,
}

#[derive(Deserialize)]
struct TransformConfig {
    operation: TransformOp,
    #[serde(default, alias = "inputVariable")]
    input_variable: Option<String>,
    #[serde(default)]
    expression: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default, alias = "outputVariable")]
    output_variable: Option<String>,
}

impl NodeHandler for TransformHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::Transform
    }

    fn execute(
        &self,
        config: serde_json::Value,
        context: Context,
    ) -> BoxFuture<'_, Result<ContextDelta>> {
        Box::pin(async move {
            let config: TransformConfig = serde_json::from_value(config)
                .map_err(|e| EngineError::Config(format!("invalid transform config: {}", e)))?;

            debug!(operation = ?config.operation, "Applying transform");

            let (default_key, result) = match config.operation {
                TransformOp::Map => ("mapped", map_elements(&config, &context, false)?),
                TransformOp::Filter => ("filtered", map_elements(&config, &context, true)?),
                TransformOp::Merge => ("merged", merge_sources(&config.sources, &context)?),
            };

            let key = config
                .output_variable
                .unwrap_or_else(|| default_key.to_string());
            let mut delta = ContextDelta::new();
            delta.insert(key, result);
            Ok(delta)
        })
    }
}

/// Evaluate the configured expression once per element of the input
/// array, with the element bound as `item`. In filter mode the result is
/// a truthiness test keeping the original element.
fn map_elements(config: &TransformConfig, context: &Context, filter: bool) -> Result<Value> {
    let input = config
        .input_variable
        .as_deref()
        .ok_or_else(|| EngineError::Transform("map/filter requires input_variable".to_string()))?;
    let expression = config
        .expression
        .as_deref()
        .ok_or_else(|| EngineError::Transform("map/filter requires expression".to_string()))?;

    let items = match context.get(input) {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(EngineError::Transform(format!(
                "input '{}' is not an array",
                input
            )));
        }
        None => {
            return Err(EngineError::Transform(format!(
                "input '{}' is not set",
                input
            )));
        }
    };

    let mut scope = context.data().clone();
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        scope.insert("item".to_string(), item.clone());
        if filter {
            if expr::evaluate_bool(expression, &scope)? {
                result.push(item.clone());
            }
        } else {
            result.push(expr::evaluate(expression, &scope)?);
        }
    }
    Ok(Value::Array(result))
}

/// Shallow-merge the named context keys, later sources winning.
fn merge_sources(sources: &[String], context: &Context) -> Result<Value> {
    if sources.is_empty() {
        return Err(EngineError::Transform(
            "merge requires at least one source".to_string(),
        ));
    }

    let mut merged = serde_json::Map::new();
    for source in sources {
        match context.get(source) {
            Some(Value::Object(map)) => {
                for (key, value) in map {
                    merged.insert(key.clone(), value.clone());
                }
            }
            Some(_) => {
                return Err(EngineError::Transform(format!(
                    "merge source '{}' is not an object",
                    source
                )));
            }
            None => {
                return Err(EngineError::Transform(format!(
                    "merge source '{}' is not set",
                    source
                )));
            }
        }
    }
    Ok(Value::Object(merged))
}
