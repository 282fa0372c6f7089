//! Task dispatch across a router, with concurrent callers and channels.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

use serde_json::{Map, Value, json};
use slowctl::control::ControlNode;
use slowctl::control::nodes::{ConstNode, FnNode};
use slowctl::task::{ChannelKind, Kwargs, TaskModule, TaskRouter};

use crate::mock_nodes::RecordingNode;

fn call(v: Value) -> Kwargs {
    match v {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[test]
fn concurrent_dispatch_starts_exactly_one() {
    const CALLERS: usize = 8;

    let started = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Mutex::new(()));
    let hold = gate.lock().unwrap();

    let module = {
        let started = Arc::clone(&started);
        let gate = Arc::clone(&gate);
        Arc::new(TaskModule::new("ramp").with_function("run", move |_| {
            started.fetch_add(1, Ordering::SeqCst);
            drop(gate.lock().unwrap());
            Ok(())
        }))
    };

    let barrier = Arc::new(Barrier::new(CALLERS));
    let workers: Vec<_> = (0..CALLERS)
        .map(|_| {
            let module = Arc::clone(&module);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                module.process_command(&call(json!({"ramp.run()": null})))
            })
        })
        .collect();
    let replies: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    let accepted = replies.iter().filter(|r| **r == Some(json!(true))).count();
    let busy = replies
        .iter()
        .filter(|r| {
            **r == Some(json!({"status": "error", "message": "command already running"}))
        })
        .count();
    assert_eq!(accepted, 1);
    assert_eq!(busy, CALLERS - 1);

    drop(hold);
    module.shutdown();
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(module.command_history().len(), 1);
}

#[test]
fn router_drives_tree_nodes_from_task_functions() {
    let output = Arc::new(RecordingNode::new(json!("OFF")));
    let mut router = TaskRouter::new();
    {
        let output = Arc::clone(&output);
        router.register(Arc::new(TaskModule::new("src").with_function(
            "enable",
            move |kwargs| {
                let state = kwargs.get("state").cloned().unwrap_or(json!("ON"));
                output.set(&state)?;
                Ok(())
            },
        )));
    }
    router.register(Arc::new(TaskModule::new("log").with_function("mark", |_| Ok(()))));

    assert_eq!(
        router.process_command(&call(json!({"await src.enable()": null, "state": "STBY"}))),
        Some(json!(true))
    );
    assert_eq!(output.writes(), vec![json!("STBY")]);

    let history = router.module("src").unwrap().command_history();
    assert_eq!(history[0].command, "src.enable(state=STBY)");
    assert_eq!(router.process_command(&call(json!({"pump.on()": null}))), None);
}

#[test]
fn exported_channels_reflect_live_nodes() {
    let reads = Arc::new(AtomicUsize::new(0));
    let module = {
        let reads = Arc::clone(&reads);
        TaskModule::new("gauge")
            .with_function("noop", |_| Ok(()))
            .with_export(move || {
                let reads = Arc::clone(&reads);
                Ok(vec![
                    (
                        "pressure".to_string(),
                        Arc::new(FnNode::reader(move || {
                            Ok(json!(reads.fetch_add(1, Ordering::SeqCst)))
                        })) as Arc<dyn ControlNode>,
                    ),
                    (
                        "history".to_string(),
                        Arc::new(ConstNode::new(json!({"table": {"t": [0, 1], "p": [3, 2]}}))),
                    ),
                ])
            })
    };

    let channels = module.get_channels();
    assert_eq!(channels.len(), 2);
    assert_eq!(channels[0].kind, None);
    assert_eq!(channels[1].kind, Some(ChannelKind::Table));
    assert_eq!(
        serde_json::to_value(&channels).unwrap(),
        json!([{"name": "pressure"}, {"name": "history", "type": "table"}])
    );

    // One read during the scan, one per get_data.
    assert_eq!(module.get_data("pressure"), Some(json!("1")));
    assert_eq!(module.get_data("pressure"), Some(json!("2")));
    assert_eq!(module.get_data("nothing"), None);
}
