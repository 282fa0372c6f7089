//! slowctl: command-plane server entry point.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  CLI (--config, --port) ─▶ ServerConfig                 │
//! │                                                         │
//! │  DemoSource plugin ─▶ NodeTree ─▶ ProtocolBridge        │
//! │                                        │                │
//! │                      Server (accept loop, Link threads) │
//! │                                        ▲                │
//! │  stdin watcher ── EOF / "quit" ── ShutdownHandle        │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use serde_json::json;

use slowctl::config::ServerConfig;
use slowctl::control::nodes::{ConstNode, FnNode, ValueNode};
use slowctl::control::{ControlNode, ControlPlugin, NodeTree};
use slowctl::protocol::ProtocolBridge;
use slowctl::server::{Server, ShutdownHandle};

#[derive(Debug, Parser)]
#[command(name = "slowctl", version, about = "Slow-control command plane server")]
struct Cli {
    /// JSON server configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listening port.
    #[arg(long)]
    port: Option<u16>,
}

// ── Demo instrument ───────────────────────────────────────────

/// A one-channel signal source exposed as `SRC1`.
struct DemoSource;

impl ControlPlugin for DemoSource {
    fn name(&self) -> &str {
        "demo-source"
    }

    fn register(&self, tree: &NodeTree) {
        let src = tree.add_subtree("SRC1");
        let output = Arc::new(ValueNode::new(json!("OFF")));
        src.register_node("OUTPUT", Arc::clone(&output) as Arc<dyn ControlNode>);
        src.register_node("FREQ", Arc::new(ValueNode::new(json!(1000))));
        src.register_node("AMPL", Arc::new(ValueNode::new(json!(0.5))));
        src.register_node(
            "STATE",
            Arc::new(FnNode::reader(move || {
                let on = output.get()?.as_str().is_some_and(|s| s.eq_ignore_ascii_case("ON"));
                Ok(json!(if on { "RUNNING" } else { "IDLE" }))
            })),
        );
    }
}

fn build_tree() -> Arc<NodeTree> {
    let root = Arc::new(NodeTree::new());
    root.register_node(
        "*IDN",
        Arc::new(ConstNode::new(json!(format!(
            "slowctl,demo,0,{}",
            env!("CARGO_PKG_VERSION")
        )))),
    );
    let plugin = DemoSource;
    root.load_plugin(&plugin);
    info!("Plugin loaded: {}", plugin.name());
    root
}

// ── Console watcher ───────────────────────────────────────────

/// Trigger `shutdown` when stdin closes or reads `quit`.
fn watch_stdin(shutdown: ShutdownHandle) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("stdin-watcher".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) if line.trim().eq_ignore_ascii_case("quit") => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("stdin: {}", e);
                        break;
                    }
                }
            }
            info!("Shutdown requested");
            shutdown.trigger();
        })?;
    Ok(())
}

fn load_config(cli: &Cli) -> Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    info!("slowctl v{}", env!("CARGO_PKG_VERSION"));
    let config = load_config(&cli)?;

    let bridge = ProtocolBridge::for_tree(build_tree());
    let server = Server::bind(&config, bridge).context("starting server")?;
    let shutdown = server.shutdown_handle();
    watch_stdin(shutdown).context("starting stdin watcher")?;

    info!("System ready. Type 'quit' or close stdin to stop.");
    server.run()?;
    Ok(())
}
