//! Mock control nodes for integration tests.
//!
//! Records every write so tests can assert on the full command history
//! without a real instrument behind the tree.

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use slowctl::control::nodes::{ConstNode, ValueNode};
use slowctl::control::{ControlNode, NodeTree};
use slowctl::error::NodeError;

// ── RecordingNode ─────────────────────────────────────────────

/// Holds a value and records every `set`.
pub struct RecordingNode {
    value: Mutex<Value>,
    pub writes: Mutex<Vec<Value>>,
}

#[allow(dead_code)]
impl RecordingNode {
    pub fn new(initial: Value) -> Self {
        Self {
            value: Mutex::new(initial),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn writes(&self) -> Vec<Value> {
        self.writes.lock().unwrap().clone()
    }
}

impl ControlNode for RecordingNode {
    fn get(&self) -> Result<Value, NodeError> {
        Ok(self.value.lock().unwrap().clone())
    }

    fn set(&self, value: &Value) -> Result<(), NodeError> {
        self.writes.lock().unwrap().push(value.clone());
        *self.value.lock().unwrap() = value.clone();
        Ok(())
    }
}

// ── FaultyNode ────────────────────────────────────────────────

/// Every access fails as if the instrument timed out.
pub struct FaultyNode;

impl ControlNode for FaultyNode {
    fn get(&self) -> Result<Value, NodeError> {
        Err(NodeError::Io("instrument timeout".into()))
    }

    fn set(&self, _value: &Value) -> Result<(), NodeError> {
        Err(NodeError::Io("instrument timeout".into()))
    }
}

// ── Bench tree ────────────────────────────────────────────────

/// A signal source and a vacuum gauge, plus handles to the recorders.
pub struct Bench {
    pub tree: Arc<NodeTree>,
    pub output: Arc<RecordingNode>,
    pub freq: Arc<RecordingNode>,
}

pub fn bench() -> Bench {
    let tree = Arc::new(NodeTree::new());
    tree.register_node("*IDN", Arc::new(ConstNode::new(json!("BENCH,1"))));

    let output = Arc::new(RecordingNode::new(json!("OFF")));
    let freq = Arc::new(RecordingNode::new(json!("1000")));
    let src = tree.add_subtree("SRC1");
    src.register_node("OUTPUT", Arc::clone(&output) as Arc<dyn ControlNode>);
    src.register_node("FREQ", Arc::clone(&freq) as Arc<dyn ControlNode>);
    src.register_node("AMPL", Arc::new(ValueNode::new(json!(0.5))));

    let gauge = tree.add_subtree("GAUGE");
    gauge.register_node("PRESSURE", Arc::new(ConstNode::new(json!("1.5E-6"))));
    gauge.register_node("HEATER", Arc::new(FaultyNode));

    Bench { tree, output, freq }
}
