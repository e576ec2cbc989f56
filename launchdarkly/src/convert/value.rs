//! Typed scalar codec for clause values.
//!
//! Configuration carries every clause value as a string plus a declared
//! `value_type`; the API wants real JSON scalars.

use super::error::ConvertError;
use serde_json::{Number, Value};
use std::fmt;

/// Largest integer a double represents exactly.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    Bool,
    Number,
    #[default]
    String,
}

impl ValueType {
    pub const ALL: [&'static str; 3] = ["boolean", "number", "string"];

    pub fn parse(s: &str) -> Result<Self, ConvertError> {
        match s {
            "boolean" => Ok(ValueType::Bool),
            "number" => Ok(ValueType::Number),
            "string" => Ok(ValueType::String),
            other => Err(ConvertError::validation(format!(
                "invalid clause value type {:?}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Bool => "boolean",
            ValueType::Number => "number",
            ValueType::String => "string",
        }
    }

    /// Type of an API value. Anything non-scalar is treated as a string.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Bool(_) => ValueType::Bool,
            Value::Number(_) => ValueType::Number,
            _ => ValueType::String,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn decode(raw: &str, value_type: ValueType) -> Result<Value, ConvertError> {
    let invalid = || ConvertError::TypeCoercion {
        raw: raw.to_string(),
        value_type,
    };
    match value_type {
        ValueType::String => Ok(Value::String(raw.to_string())),
        ValueType::Bool => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        ValueType::Number => {
            let n: f64 = raw.parse().map_err(|_| invalid())?;
            number_value(n).ok_or_else(invalid)
        }
    }
}

/// Inverse of [`decode`]. Numbers use the shortest decimal form.
pub fn encode(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Integral values become JSON integers so `5` does not turn into `5.0`.
pub fn number_value(n: f64) -> Option<Value> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() < MAX_EXACT_INT {
        return Some(Value::from(n as i64));
    }
    Number::from_f64(n).map(Value::Number)
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < MAX_EXACT_INT {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}
