//! Arithmetic tools.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolCategory};

fn operands_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "a": { "type": "number", "description": "First operand" },
            "b": { "type": "number", "description": "Second operand" }
        },
        "required": ["a", "b"]
    })
}

/// Read a numeric argument. Models sometimes quote numbers, so strings are accepted.
pub(crate) fn number_arg(args: &Value, key: &str) -> anyhow::Result<f64> {
    match &args[key] {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| anyhow::anyhow!("'{}' is not a finite number", key)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| anyhow::anyhow!("'{}' is not a number: {}", key, s)),
        Value::Null => Err(anyhow::anyhow!("Missing '{}' argument", key)),
        other => Err(anyhow::anyhow!("'{}' is not a number: {}", key, other)),
    }
}

/// Render a number without a trailing `.0` when it is whole.
pub(crate) fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Add two numbers.
pub struct Add;

#[async_trait]
impl Tool for Add {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Add two numbers."
    }

    fn parameters_schema(&self) -> Value {
        operands_schema()
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Arithmetic { operator: "+" }
    }

    async fn execute(&self, args: Value, _workspace: &Path) -> anyhow::Result<String> {
        let a = number_arg(&args, "a")?;
        let b = number_arg(&args, "b")?;
        Ok(format_number(a + b))
    }
}

/// Multiply two numbers.
pub struct Multiply;

#[async_trait]
impl Tool for Multiply {
    fn name(&self) -> &str {
        "multiply"
    }

    fn description(&self) -> &str {
        "Multiply two numbers."
    }

    fn parameters_schema(&self) -> Value {
        operands_schema()
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Arithmetic { operator: "*" }
    }

    async fn execute(&self, args: Value, _workspace: &Path) -> anyhow::Result<String> {
        let a = number_arg(&args, "a")?;
        let b = number_arg(&args, "b")?;
        Ok(format_number(a * b))
    }
}

/// Divide two numbers.
pub struct Divide;

#[async_trait]
impl Tool for Divide {
    fn name(&self) -> &str {
        "divide"
    }

    fn description(&self) -> &str {
        "Divide the first number by the second."
    }

    fn parameters_schema(&self) -> Value {
        operands_schema()
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Arithmetic { operator: "/" }
    }

    async fn execute(&self, args: Value, _workspace: &Path) -> anyhow::Result<String> {
        let a = number_arg(&args, "a")?;
        let b = number_arg(&args, "b")?;
        if b == 0.0 {
            return Err(anyhow::anyhow!("division by zero"));
        }
        Ok(format_number(a / b))
    }
}
