//! Generic in-memory nodes.
//!
//! Stand-ins for instrument drivers: a read/write register, a fixed
//! readback, and a closure-backed node for wrapping arbitrary logic.

use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use super::node::ControlNode;
use crate::error::NodeError;

/// Read/write register holding the last written value.
#[derive(Debug, Default)]
pub struct ValueNode {
    value: Mutex<Value>,
}

impl ValueNode {
    pub fn new(initial: Value) -> Self {
        Self {
            value: Mutex::new(initial),
        }
    }
}

impl ControlNode for ValueNode {
    fn get(&self) -> Result<Value, NodeError> {
        Ok(self
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn set(&self, value: &Value) -> Result<(), NodeError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = value.clone();
        Ok(())
    }
}

/// Read-only node with a fixed value. Writes are ignored.
#[derive(Debug, Clone)]
pub struct ConstNode {
    value: Value,
}

impl ConstNode {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

impl ControlNode for ConstNode {
    fn get(&self) -> Result<Value, NodeError> {
        Ok(self.value.clone())
    }
}

type Getter = Box<dyn Fn() -> Result<Value, NodeError> + Send + Sync>;
type Setter = Box<dyn Fn(&Value) -> Result<(), NodeError> + Send + Sync>;

/// Node backed by closures.
pub struct FnNode {
    getter: Getter,
    setter: Option<Setter>,
}

impl FnNode {
    /// Read-only node computing its value on every read.
    pub fn reader<G>(getter: G) -> Self
    where
        G: Fn() -> Result<Value, NodeError> + Send + Sync + 'static,
    {
        Self {
            getter: Box::new(getter),
            setter: None,
        }
    }

    /// Add a write handler.
    #[must_use]
    pub fn with_setter<S>(mut self, setter: S) -> Self
    where
        S: Fn(&Value) -> Result<(), NodeError> + Send + Sync + 'static,
    {
        self.setter = Some(Box::new(setter));
        self
    }
}

impl ControlNode for FnNode {
    fn get(&self) -> Result<Value, NodeError> {
        (self.getter)()
    }

    fn set(&self, value: &Value) -> Result<(), NodeError> {
        match &self.setter {
            Some(setter) => setter(value),
            None => Ok(()),
        }
    }
}
