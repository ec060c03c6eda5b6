//! ABOUTME: Condition node executor — evaluates `expression` against inputs, emits `{result: bool}`
//! ABOUTME: Branch-decision recording for the engine happens downstream in dagforge-workflows

use dagforge_core::node::{NodeConfig, NodeKind};
use serde_json::Value;

use crate::dispatch::{ExecutorOutput, NodeExecutor};
use crate::error::{ExecutorError, Result};

const OPERATORS: [&str; 6] = ["==", "!=", ">=", "<=", ">", "<"];

/// Resolve a dotted path against `inputs`, e.g. `"order.total"`.
fn resolve(inputs: &Value, path: &str) -> Option<Value> {
    let mut current = inputs;
    for segment in path.trim().split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current.clone())
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64().or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Evaluate a small boolean-expression language: a bare dotted path for a
/// truthiness check, or `<path> <op> <literal>` for a comparison. This is
/// intentionally not a general expression grammar — just the scoped subset
/// condition nodes need.
fn evaluate(expression: &str, inputs: &Value) -> std::result::Result<bool, String> {
    for op in OPERATORS {
        if let Some(idx) = expression.find(op) {
            let (lhs, rhs) = expression.split_at(idx);
            let rhs = &rhs[op.len()..];
            let lhs_value = resolve(inputs, lhs).ok_or_else(|| format!("path '{}' not found", lhs.trim()))?;
            let rhs_trimmed = rhs.trim().trim_matches('"').trim_matches('\'');
            let rhs_value = resolve(inputs, rhs_trimmed).unwrap_or_else(|| {
                serde_json::from_str(rhs_trimmed).unwrap_or_else(|_| Value::String(rhs_trimmed.to_string()))
            });

            return Ok(match op {
                "==" => lhs_value == rhs_value,
                "!=" => lhs_value != rhs_value,
                ">" | "<" | ">=" | "<=" => {
                    let (Some(l), Some(r)) = (as_f64(&lhs_value), as_f64(&rhs_value)) else {
                        return Err(format!("non-numeric comparison in '{expression}'"));
                    };
                    match op {
                        ">" => l > r,
                        "<" => l < r,
                        ">=" => l >= r,
                        "<=" => l <= r,
                        _ => unreachable!(),
                    }
                }
                _ => unreachable!(),
            });
        }
    }
    resolve(inputs, expression)
        .map(|v| truthy(&v))
        .ok_or_else(|| format!("path '{}' not found", expression.trim()))
}

pub struct ConditionExecutor;

#[async_trait::async_trait]
impl NodeExecutor for ConditionExecutor {
    async fn invoke(&self, node: &NodeConfig, inputs: Value) -> Result<ExecutorOutput> {
        let NodeKind::Condition(config) = &node.kind else {
            return Err(ExecutorError::Runtime(format!("{} is not a condition node", node.id)));
        };
        let result = evaluate(&config.expression, &inputs).map_err(ExecutorError::Validation)?;
        Ok(ExecutorOutput::value(serde_json::json!({ "result": result })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_path_truthiness() {
        assert!(evaluate("flag", &json!({"flag": true})).unwrap());
        assert!(!evaluate("flag", &json!({"flag": false})).unwrap());
    }

    #[test]
    fn numeric_comparison() {
        assert!(evaluate("order.total > 100", &json!({"order": {"total": 150}})).unwrap());
        assert!(!evaluate("order.total > 100", &json!({"order": {"total": 50}})).unwrap());
    }

    #[test]
    fn string_equality() {
        assert!(evaluate("status == \"ready\"", &json!({"status": "ready"})).unwrap());
        assert!(!evaluate("status == \"ready\"", &json!({"status": "pending"})).unwrap());
    }

    #[test]
    fn missing_path_is_error() {
        assert!(evaluate("ghost", &json!({})).is_err());
    }
}
