//! Protocol bridge: command lines in, one reply out.
//!
//! ```text
//!  line ──▶ PathResolver ──▶ clause ──▶ InstrumentHandler ──▶ reply
//!                 ▲            clause ──▶ InstrumentHandler ──▶ reply
//!                 │            clause ──▶ InstrumentHandler ──▶ reply ──▶ wire
//!           session path
//! ```
//!
//! Every clause of a line is executed in order, but only the reply of the
//! last one is returned. This lets a client batch settings with a trailing
//! query (`:SRC1:OUTPUT ON;:SRC1:FREQ?`) and read a single answer. Earlier
//! replies are computed and discarded.

use std::sync::Arc;

use log::{debug, warn};

use super::resolver::PathResolver;
use crate::control::node::{params_to_value, value_to_string};
use crate::control::tree::NodeTree;

/// Executes one resolved clause.
///
/// Implementations must never fail the line: errors turn into a reply
/// string (usually empty) so later clauses still run.
pub trait InstrumentHandler: Send + Sync {
    fn process_instrument_command(&self, path: &[String], params: &[String]) -> String;
}

/// Joins the resolver to an instrument handler.
#[derive(Clone)]
pub struct ProtocolBridge {
    handler: Arc<dyn InstrumentHandler>,
}

impl ProtocolBridge {
    pub fn new(handler: Arc<dyn InstrumentHandler>) -> Self {
        Self { handler }
    }

    /// Bridge backed by a node tree.
    pub fn for_tree(tree: Arc<NodeTree>) -> Self {
        Self::new(Arc::new(TreeHandler::new(tree)))
    }

    /// Process one command line and return the reply to transmit.
    pub fn handle_line(&self, line: &str, session: &mut PathResolver) -> String {
        let mut reply = String::new();
        for clause in session.clauses(line) {
            reply = self
                .handler
                .process_instrument_command(&clause.path, &clause.params);
            debug!("query: [{}] -> [{}]", clause.path.join(":"), reply);
        }
        reply
    }
}

// ───────────────────────────────────────────────────────────────
// Tree-backed handler
// ───────────────────────────────────────────────────────────────

/// Maps clauses onto a [`NodeTree`].
///
/// - `PATH?` reads the node at `PATH` and replies with its value.
/// - `PATH params...` writes the parameters to the node and replies `""`.
/// - Unknown paths and node failures reply `""`.
pub struct TreeHandler {
    tree: Arc<NodeTree>,
}

impl TreeHandler {
    pub fn new(tree: Arc<NodeTree>) -> Self {
        Self { tree }
    }

    fn query(&self, path: &[String]) -> String {
        let mut path = path.to_vec();
        if let Some(last) = path.last_mut() {
            last.truncate(last.trim_end_matches('?').len());
        }
        match self.tree.get_path(&path) {
            Ok(value) => value_to_string(&value),
            Err(e) => {
                warn!("BRIDGE: query {}? failed: {}", path.join(":"), e);
                String::new()
            }
        }
    }

    fn write(&self, path: &[String], params: &[String]) -> String {
        let value = params_to_value(params);
        if let Err(e) = self.tree.set_path(path, &value) {
            warn!("BRIDGE: write {} failed: {}", path.join(":"), e);
        }
        String::new()
    }
}

impl InstrumentHandler for TreeHandler {
    fn process_instrument_command(&self, path: &[String], params: &[String]) -> String {
        if path.last().is_some_and(|s| s.ends_with('?')) {
            self.query(path)
        } else {
            self.write(path, params)
        }
    }
}
