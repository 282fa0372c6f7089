//! Framer → resolver → bridge → tree, without sockets.

use serde_json::json;
use slowctl::protocol::{CommandFramer, PathResolver, ProtocolBridge};

use crate::mock_nodes::bench;

/// Run raw bytes through the full in-process pipeline.
fn exchange(bridge: &ProtocolBridge, session: &mut PathResolver, bytes: &[u8]) -> Vec<String> {
    let mut framer = CommandFramer::new(b'\n');
    framer
        .feed(bytes)
        .into_iter()
        .map(|line| bridge.handle_line(&line.unwrap(), session))
        .collect()
}

#[test]
fn batched_write_then_query() {
    let b = bench();
    let bridge = ProtocolBridge::for_tree(b.tree.clone());
    let mut session = PathResolver::new();

    let replies = exchange(&bridge, &mut session, b":SRC1:OUTPUT ON;:SRC1:FREQ?;\n");
    assert_eq!(replies, vec!["1000"]);
    assert_eq!(b.output.writes(), vec![json!("ON")]);
}

#[test]
fn crlf_client_gets_one_reply_per_line() {
    let b = bench();
    let bridge = ProtocolBridge::for_tree(b.tree.clone());
    let mut session = PathResolver::new();

    let replies = exchange(&bridge, &mut session, b"*IDN?\r\n:GAUGE:PRESSURE?\r\n");
    assert_eq!(replies, vec!["BENCH,1", "1.5E-6"]);
}

#[test]
fn session_path_spans_lines() {
    let b = bench();
    let bridge = ProtocolBridge::for_tree(b.tree.clone());
    let mut session = PathResolver::new();

    exchange(&bridge, &mut session, b":SRC1:OUTPUT ON\n");
    let replies = exchange(&bridge, &mut session, b"FREQ 2500;FREQ?\n");
    assert_eq!(replies, vec!["2500"]);
    assert_eq!(b.freq.writes(), vec![json!(2500)]);
    assert_eq!(session.last_path(), ["SRC1", "FREQ?"]);
}

#[test]
fn lowercase_addresses_resolve() {
    let b = bench();
    let bridge = ProtocolBridge::for_tree(b.tree.clone());
    let mut session = PathResolver::new();
    assert_eq!(bridge.handle_line(":src1:ampl?", &mut session), "0.5");
}

#[test]
fn faulty_node_replies_empty_and_line_continues() {
    let b = bench();
    let bridge = ProtocolBridge::for_tree(b.tree.clone());
    let mut session = PathResolver::new();

    assert_eq!(bridge.handle_line(":GAUGE:HEATER?", &mut session), "");
    let reply = bridge.handle_line(":GAUGE:HEATER ON;:SRC1:OUTPUT ON", &mut session);
    assert_eq!(reply, "");
    assert_eq!(b.output.writes(), vec![json!("ON")]);
}

#[test]
fn unknown_address_replies_empty() {
    let b = bench();
    let bridge = ProtocolBridge::for_tree(b.tree.clone());
    let mut session = PathResolver::new();
    assert_eq!(bridge.handle_line(":NOPE:NADA?", &mut session), "");
    assert_eq!(bridge.handle_line(":SRC1:NOPE 1", &mut session), "");
}
