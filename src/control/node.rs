//! Control node contract: one addressable control point.
//!
//! A node is anything that can be read and, optionally, written: an
//! instrument setting, a readback, a sub-tree of further nodes. Values are
//! dynamic (`serde_json::Value`) so numbers, strings, and structured
//! tree/table data travel through the same interface.
//!
//! ## Thread safety
//!
//! Nodes are shared between connection threads and task threads without any
//! locking at tree level. Implementations MUST make `get` and `set` safe to
//! call concurrently (`Send + Sync` plus their own interior locking).

use std::sync::Arc;

use serde_json::Value;

use crate::error::NodeError;

/// An addressable control point.
pub trait ControlNode: Send + Sync {
    /// Read the current value.
    fn get(&self) -> Result<Value, NodeError> {
        Ok(Value::Null)
    }

    /// Write a value. Read-only nodes keep this default, which silently
    /// ignores the write.
    fn set(&self, _value: &Value) -> Result<(), NodeError> {
        Ok(())
    }

    /// Look up a named child. Leaf nodes have none.
    fn child(&self, _name: &str) -> Option<Arc<dyn ControlNode>> {
        None
    }
}

/// Convenience reads available on every node.
pub trait ControlNodeExt: ControlNode {
    /// Current value in its display form (see [`value_to_string`]).
    fn get_string(&self) -> Result<String, NodeError> {
        self.get().map(|v| value_to_string(&v))
    }

    /// Current value as a number. Numeric strings are accepted, as
    /// instruments commonly report readings as text.
    fn get_f64(&self) -> Result<f64, NodeError> {
        let value = self.get()?;
        match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
        .ok_or_else(|| NodeError::InvalidValue(format!("not a number: {value}")))
    }
}

impl<T: ControlNode + ?Sized> ControlNodeExt for T {}

/// Display form of a value: `""` for null, strings verbatim, everything
/// else as compact JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Interpret one protocol parameter token as a value.
///
/// Tokens that parse as JSON numbers or booleans become those; anything
/// else (including `ON`, `OFF`, quoted text) stays a string.
pub fn parse_param(token: &str) -> Value {
    match serde_json::from_str::<Value>(token) {
        Ok(v @ (Value::Number(_) | Value::Bool(_))) => v,
        _ => Value::String(token.to_string()),
    }
}

/// Collapse a parameter list into one value: nothing → null, one token →
/// scalar, several → array.
pub fn params_to_value(params: &[String]) -> Value {
    match params {
        [] => Value::Null,
        [single] => parse_param(single),
        many => Value::Array(many.iter().map(|p| parse_param(p)).collect()),
    }
}
