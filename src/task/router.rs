//! Routes call mappings across task modules.

use std::sync::Arc;

use log::debug;
use serde_json::Value;

use super::module::{Kwargs, TaskModule};

/// Ordered set of task modules.
///
/// A call is offered to each module in registration order; the first one
/// that handles it answers.
#[derive(Debug, Default)]
pub struct TaskRouter {
    modules: Vec<Arc<TaskModule>>,
}

impl TaskRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: Arc<TaskModule>) {
        self.modules.push(module);
    }

    pub fn module(&self, name: &str) -> Option<&Arc<TaskModule>> {
        self.modules.iter().find(|m| m.name() == name)
    }

    pub fn modules(&self) -> &[Arc<TaskModule>] {
        &self.modules
    }

    /// First `Some` answer from the registered modules.
    pub fn process_command(&self, params: &Kwargs) -> Option<Value> {
        let reply = self.modules.iter().find_map(|m| m.process_command(params));
        if reply.is_none() {
            debug!("TASK: no module handled {:?}", params.keys().collect::<Vec<_>>());
        }
        reply
    }

    /// Wait for every module's in-flight command.
    pub fn shutdown(&self) {
        for module in &self.modules {
            module.shutdown();
        }
    }
}
