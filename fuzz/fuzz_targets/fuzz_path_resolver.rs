//! Fuzz target: `PathResolver` + `ProtocolBridge::handle_line`
//!
//! Feeds arbitrary text lines through one session against a small tree.
//! Resolution and dispatch must never panic, and every resolved clause
//! must carry a non-empty path.
//!
//! cargo fuzz run fuzz_path_resolver

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use serde_json::json;
use slowctl::control::NodeTree;
use slowctl::control::nodes::ValueNode;
use slowctl::protocol::{PathResolver, ProtocolBridge};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let tree = Arc::new(NodeTree::new());
    tree.add_subtree("SRC1")
        .register_node("FREQ", Arc::new(ValueNode::new(json!(1000))));
    let bridge = ProtocolBridge::for_tree(tree);

    let mut session = PathResolver::new();
    for line in text.split('\n') {
        let mut replay = session.clone();
        for clause in replay.clauses(line) {
            assert!(!clause.path.is_empty());
        }
        let _ = bridge.handle_line(line, &mut session);
        assert_eq!(session.last_path(), replay.last_path());
    }
});
