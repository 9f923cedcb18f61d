//! Built-in arithmetic tools, mostly useful for smoke-testing the pipeline.

use super::discovery::{ToolExport, ToolSource};
use super::traits::FnTool;
use crate::types::ToolArgs;
use anyhow::{anyhow, bail, Result};
use serde_json::{json, Value};
use std::sync::Arc;

/// Tool source exporting `add_num` and `sqrt_num`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArithmeticTools;

impl ToolSource for ArithmeticTools {
    fn module(&self) -> &str {
        "arithmetic"
    }

    fn exports(&self) -> Result<Vec<ToolExport>> {
        Ok(vec![
            ToolExport::new(Arc::new(FnTool::new("add_num", add_num)), add_num_schema()),
            ToolExport::new(Arc::new(FnTool::new("sqrt_num", sqrt_num)), sqrt_num_schema()),
        ])
    }
}

pub fn add_num_schema() -> Value {
    json!({
        "name": "add_num",
        "description": "Adds the absolute values of two integers",
        "parameters": {
            "type": "object",
            "properties": {
                "num1": {"type": "integer", "description": "First number to add"},
                "num2": {"type": "integer", "description": "Second number to add"}
            },
            "required": ["num1", "num2"]
        }
    })
}

pub fn sqrt_num_schema() -> Value {
    json!({
        "name": "sqrt_num",
        "description": "Computes the positive square root of a number",
        "parameters": {
            "type": "object",
            "properties": {
                "num": {"type": "integer", "description": "Number to take the root of"}
            },
            "required": ["num"]
        }
    })
}

/// `|num1| + |num2|`
pub fn add_num(args: ToolArgs) -> Result<String> {
    let a = integer_arg(&args, "num1")?;
    let b = integer_arg(&args, "num2")?;
    let sum = a
        .unsigned_abs()
        .checked_add(b.unsigned_abs())
        .ok_or_else(|| anyhow!("sum of {} and {} overflows", a, b))?;
    Ok(sum.to_string())
}

/// Square root, always rendered as a float (`16` -> `"4.0"`).
pub fn sqrt_num(args: ToolArgs) -> Result<String> {
    let num = args
        .get("num")
        .and_then(Value::as_f64)
        .ok_or_else(|| anyhow!("Missing or non-numeric 'num' argument"))?;
    if num < 0.0 {
        bail!("cannot take the square root of negative number {}", num);
    }
    Ok(format!("{:?}", num.sqrt()))
}

fn integer_arg(args: &ToolArgs, key: &str) -> Result<i64> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| anyhow!("Missing or non-integer '{}' argument", key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> ToolArgs {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn add_uses_absolute_values() {
        assert_eq!(add_num(args(json!({"num1": 2, "num2": 3}))).unwrap(), "5");
        assert_eq!(add_num(args(json!({"num1": -2, "num2": 3}))).unwrap(), "5");
    }

    #[test]
    fn add_requires_both_numbers() {
        let err = add_num(args(json!({"num1": 2}))).unwrap_err();
        assert!(err.to_string().contains("num2"));
        assert!(add_num(args(json!({"num1": "2", "num2": 3}))).is_err());
    }

    #[test]
    fn sqrt_renders_as_float() {
        assert_eq!(sqrt_num(args(json!({"num": 16}))).unwrap(), "4.0");
        assert_eq!(sqrt_num(args(json!({"num": 2}))).unwrap(), "1.4142135623730951");
    }

    #[test]
    fn sqrt_rejects_negative_input() {
        assert!(sqrt_num(args(json!({"num": -4}))).is_err());
    }

    #[test]
    fn exported_schemas_match_names() {
        let exports = ArithmeticTools.exports().unwrap();
        let names: Vec<_> = exports
            .iter()
            .map(|e| e.schema["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["add_num", "sqrt_num"]);
    }
}
