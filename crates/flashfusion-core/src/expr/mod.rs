//! Constrained expression language for condition and transform nodes.
//!
//! Expressions are parsed into a small AST and evaluated by a safe
//! interpreter over the run context: comparisons, boolean operators,
//! arithmetic, `contains`, and dotted field access over named variables.
//! No calls, no assignment, no general-purpose code. Unresolved
//! identifiers evaluate to null; malformed expressions are hard errors.

mod parser;

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{EngineError, Result};

/// The parsed form of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Dotted identifier path, e.g. `user.name` → `["user", "name"]`.
    Ident(Vec<String>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Contains,
}

/// Evaluate an expression against the context, producing a JSON value.
pub fn evaluate(expression: &str, context: &HashMap<String, Value>) -> Result<Value> {
    let ast = parser::parse(expression).map_err(|message| expr_error(expression, message))?;
    eval_expr(&ast, context).map_err(|message| expr_error(expression, message))
}

/// Evaluate an expression and coerce the result to a boolean.
pub fn evaluate_bool(expression: &str, context: &HashMap<String, Value>) -> Result<bool> {
    Ok(truthy(&evaluate(expression, context)?))
}

/// Resolve a dotted path (`user.name`) against the context.
pub fn lookup_path<'a>(context: &'a HashMap<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = context.get(segments.next()?)?;
    for segment in segments {
        current = current.get(segment)?;
    }
    Some(current)
}

/// JSON truthiness: null, false, 0, "" and empty containers are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn expr_error(expression: &str, message: String) -> EngineError {
    EngineError::ExpressionEvaluation {
        expression: expression.to_string(),
        message,
    }
}

fn eval_expr(expr: &Expr, context: &HashMap<String, Value>) -> std::result::Result<Value, String> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(path) => Ok(resolve_segments(path, context).cloned().unwrap_or(Value::Null)),
        Expr::Unary { op, operand } => {
            let value = eval_expr(operand, context)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                UnaryOp::Neg => negate(&value),
            }
        }
        Expr::Binary { op, left, right } => match op {
            BinaryOp::And => {
                if !truthy(&eval_expr(left, context)?) {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(truthy(&eval_expr(right, context)?)))
            }
            BinaryOp::Or => {
                if truthy(&eval_expr(left, context)?) {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(truthy(&eval_expr(right, context)?)))
            }
            _ => {
                let l = eval_expr(left, context)?;
                let r = eval_expr(right, context)?;
                match op {
                    BinaryOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
                    BinaryOp::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
                    BinaryOp::Gt => Ok(Value::Bool(compare(&l, &r)?.is_gt())),
                    BinaryOp::Ge => Ok(Value::Bool(compare(&l, &r)?.is_ge())),
                    BinaryOp::Lt => Ok(Value::Bool(compare(&l, &r)?.is_lt())),
                    BinaryOp::Le => Ok(Value::Bool(compare(&l, &r)?.is_le())),
                    BinaryOp::Contains => contains(&l, &r),
                    BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div
                    | BinaryOp::Rem => arithmetic(*op, &l, &r),
                    BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
                }
            }
        },
    }
}

fn resolve_segments<'a>(
    segments: &[String],
    context: &'a HashMap<String, Value>,
) -> Option<&'a Value> {
    let mut iter = segments.iter();
    let mut current = context.get(iter.next()?.as_str())?;
    for segment in iter {
        current = current.get(segment)?;
    }
    Some(current)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Structural equality, with numbers compared across int/float.
fn values_equal(l: &Value, r: &Value) -> bool {
    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) if l.is_number() && r.is_number() => a == b,
        _ => l == r,
    }
}

fn compare(l: &Value, r: &Value) -> std::result::Result<std::cmp::Ordering, String> {
    if l.is_number() && r.is_number() {
        let a = l.as_f64().unwrap_or_default();
        let b = r.as_f64().unwrap_or_default();
        return a
            .partial_cmp(&b)
            .ok_or_else(|| "cannot order non-finite numbers".to_string());
    }
    if let (Value::String(a), Value::String(b)) = (l, r) {
        return Ok(a.cmp(b));
    }
    Err(format!(
        "cannot order {} and {}",
        type_name(l),
        type_name(r)
    ))
}

fn negate(value: &Value) -> std::result::Result<Value, String> {
    if let Some(i) = value.as_i64() {
        return i
            .checked_neg()
            .map(Value::from)
            .ok_or_else(|| "integer overflow".to_string());
    }
    if let Some(f) = value.as_f64() {
        return float_value(-f);
    }
    Err(format!("cannot negate {}", type_name(value)))
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> std::result::Result<Value, String> {
    if op == BinaryOp::Add {
        if let (Value::String(a), Value::String(b)) = (l, r) {
            return Ok(Value::String(format!("{}{}", a, b)));
        }
    }

    if !l.is_number() || !r.is_number() {
        return Err(format!(
            "cannot apply arithmetic to {} and {}",
            type_name(l),
            type_name(r)
        ));
    }

    // Stay in integer arithmetic when both sides are integers, except for
    // division, which is always fractional.
    if let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) {
        if op != BinaryOp::Div {
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Rem => {
                    if b == 0 {
                        return Err("modulo by zero".to_string());
                    }
                    a.checked_rem(b)
                }
                _ => unreachable!(),
            };
            return result
                .map(Value::from)
                .ok_or_else(|| "integer overflow".to_string());
        }
    }

    let a = l.as_f64().unwrap_or_default();
    let b = r.as_f64().unwrap_or_default();
    match op {
        BinaryOp::Add => float_value(a + b),
        BinaryOp::Sub => float_value(a - b),
        BinaryOp::Mul => float_value(a * b),
        BinaryOp::Div => {
            if b == 0.0 {
                return Err("division by zero".to_string());
            }
            float_value(a / b)
        }
        BinaryOp::Rem => {
            if b == 0.0 {
                return Err("modulo by zero".to_string());
            }
            float_value(a % b)
        }
        _ => unreachable!(),
    }
}

fn float_value(f: f64) -> std::result::Result<Value, String> {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| "non-finite result".to_string())
}

fn contains(l: &Value, r: &Value) -> std::result::Result<Value, String> {
    match (l, r) {
        (Value::String(haystack), Value::String(needle)) => {
            Ok(Value::Bool(haystack.contains(needle.as_str())))
        }
        (Value::Array(items), needle) => {
            Ok(Value::Bool(items.iter().any(|v| values_equal(v, needle))))
        }
        (Value::Object(map), Value::String(key)) => Ok(Value::Bool(map.contains_key(key))),
        _ => Err(format!(
            "cannot apply contains to {} and {}",
            type_name(l),
            type_name(r)
        )),
    }
}
