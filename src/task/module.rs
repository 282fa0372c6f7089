//! Task module: named functions invoked from a flat parameter mapping.
//!
//! ```text
//!  {"ctl.ramp()": null, "target": 5}
//!        │
//!        ▼
//!  parse_command ──▶ CommandDescriptor { "ctl.ramp", {target: 5}, async }
//!        │
//!        ▼  namespace "ctl." stripped
//!  ┌──────────── state mutex ────────────┐
//!  │ busy? ──▶ Busy                      │
//!  │ reap finished thread                │
//!  │ lookup "ramp" ──▶ UndefinedFunction │
//!  │ append history                      │
//!  │ async: spawn "task-ctl"             │
//!  └─────────────────────────────────────┘
//!        │ sync: run inline, module stays busy
//!        ▼
//!  true | {"status": "error", "message": ...} | None
//! ```
//!
//! At most one function runs per module at any time, sync or async. There
//! is no preemption: the slot frees only when the running function returns.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::SystemTime;

use log::{error, info, warn};
use serde_json::{Map, Value, json};

use super::catalog::{ChannelCatalog, ChannelInfo, ExportFn};
use crate::error::DispatchError;

/// Keyword arguments of a call, in the caller's key order.
pub type Kwargs = Map<String, Value>;

/// A task function.
pub type TaskFn = Arc<dyn Fn(&Kwargs) -> anyhow::Result<()> + Send + Sync>;

/// Replaces built-in dispatch for a whole module.
pub type CommandProcessor = Arc<dyn Fn(&Kwargs) -> Option<Value> + Send + Sync>;

/// Suffix marking the call key.
const CALL_SUFFIX: &str = "()";
/// Prefix forcing synchronous execution.
const AWAIT_PREFIX: &str = "await ";
/// Reported in place of the message of a panicking task function.
const PANIC_MESSAGE: &str = "task function panicked";

// ───────────────────────────────────────────────────────────────
// Command descriptor
// ───────────────────────────────────────────────────────────────

/// A call decoded from a parameter mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDescriptor {
    /// Namespaced name, e.g. `"ctl.ramp"`.
    pub function_name: String,
    pub kwargs: Kwargs,
    pub is_async: bool,
}

/// Decode the call marker and keyword arguments from `params`.
///
/// Every key longer than two characters ending in `()` is a call marker
/// and never a kwarg. If several are present the last one the caller
/// wrote wins.
pub fn parse_command(params: &Kwargs) -> Result<CommandDescriptor, DispatchError> {
    let mut call: Option<(String, bool)> = None;
    let mut kwargs = Kwargs::new();

    for (key, value) in params {
        if key.len() > CALL_SUFFIX.len() && key.ends_with(CALL_SUFFIX) {
            let name = &key[..key.len() - CALL_SUFFIX.len()];
            call = Some(match name.strip_prefix(AWAIT_PREFIX) {
                Some(rest) => (rest.trim_start().to_string(), false),
                None => (name.to_string(), true),
            });
        } else {
            kwargs.insert(key.clone(), value.clone());
        }
    }

    let (function_name, is_async) = call.ok_or(DispatchError::NoFunctionSpecified)?;
    Ok(CommandDescriptor {
        function_name,
        kwargs,
        is_async,
    })
}

/// `<task>.<fn>(k1=v1,k2=v2)`.
pub fn format_invocation(task: &str, function: &str, kwargs: &Kwargs) -> String {
    let args: Vec<String> = kwargs
        .iter()
        .map(|(k, v)| match v {
            Value::String(s) => format!("{k}={s}"),
            other => format!("{k}={other}"),
        })
        .collect();
    format!("{task}.{function}({})", args.join(","))
}

// ───────────────────────────────────────────────────────────────
// History
// ───────────────────────────────────────────────────────────────

/// One accepted invocation. `command` lists kwargs in the caller's order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: SystemTime,
    pub command: String,
}

/// A function that failed after dispatch returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub timestamp: SystemTime,
    pub command: String,
    pub message: String,
}

#[derive(Default)]
struct TaskState {
    command_thread: Option<JoinHandle<()>>,
    sync_running: bool,
    history: Vec<HistoryEntry>,
}

impl TaskState {
    fn is_busy(&self) -> bool {
        self.sync_running || self.command_thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Join a thread that has already exited.
    fn reap(&mut self) {
        if let Some(thread) = self.command_thread.take() {
            // Panics are caught inside the thread; join cannot fail here.
            let _ = thread.join();
        }
    }

    fn record(&mut self, command: String) {
        let now = SystemTime::now();
        // Keep timestamps non-decreasing even if the wall clock steps back.
        let timestamp = match self.history.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
        self.history.push(HistoryEntry { timestamp, command });
    }
}

/// Clears the sync busy flag even if the function panics.
struct SyncGuard<'a>(&'a Mutex<TaskState>);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sync_running = false;
    }
}

// ───────────────────────────────────────────────────────────────
// TaskModule
// ───────────────────────────────────────────────────────────────

/// A named set of callable functions with single-flight execution.
pub struct TaskModule {
    name: String,
    functions: HashMap<String, TaskFn>,
    command_processor: Option<CommandProcessor>,
    catalog: ChannelCatalog,
    state: Mutex<TaskState>,
    last_failure: Arc<Mutex<Option<TaskFailure>>>,
}

impl TaskModule {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            catalog: ChannelCatalog::new(name.clone(), None),
            name,
            functions: HashMap::new(),
            command_processor: None,
            state: Mutex::new(TaskState::default()),
            last_failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Register `function` under `name`. Re-registering replaces it.
    pub fn with_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&Kwargs) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    /// Set the callable listing this task's exported channels.
    pub fn with_export<F>(mut self, export: F) -> Self
    where
        F: Fn() -> anyhow::Result<Vec<(String, Arc<dyn crate::control::ControlNode>)>>
            + Send
            + Sync
            + 'static,
    {
        let export: ExportFn = Arc::new(export);
        self.catalog = ChannelCatalog::new(self.name.clone(), Some(export));
        self
    }

    /// Replace built-in dispatch with `processor`.
    pub fn with_command_processor<F>(mut self, processor: F) -> Self
    where
        F: Fn(&Kwargs) -> Option<Value> + Send + Sync + 'static,
    {
        self.command_processor = Some(Arc::new(processor));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Handle a call mapping and shape the result for the wire.
    ///
    /// `None` means the call was not for this module.
    pub fn process_command(&self, params: &Kwargs) -> Option<Value> {
        if let Some(processor) = &self.command_processor {
            return processor(params);
        }
        match self.dispatch(params) {
            Ok(()) => Some(Value::Bool(true)),
            Err(e) if e.is_unhandled() => None,
            Err(e) => Some(json!({ "status": "error", "message": e.to_string() })),
        }
    }

    /// Typed dispatch: decode, check, record and run.
    pub fn dispatch(&self, params: &Kwargs) -> Result<(), DispatchError> {
        let command = parse_command(params)?;
        let function_name = command
            .function_name
            .strip_prefix(self.name.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .ok_or(DispatchError::WrongNamespace)?;

        let mut state = self.lock_state();
        if state.is_busy() {
            warn!("TASK[{}]: {} rejected, busy", self.name, function_name);
            return Err(DispatchError::Busy);
        }
        state.reap();

        let function = self
            .functions
            .get(function_name)
            .cloned()
            .ok_or_else(|| DispatchError::UndefinedFunction(function_name.to_string()))?;

        let invocation = format_invocation(&self.name, function_name, &command.kwargs);
        state.record(invocation.clone());

        if command.is_async {
            let thread = self.spawn_function(function, command.kwargs, invocation.clone())?;
            state.command_thread = Some(thread);
            info!("TASK[{}]: started {}", self.name, invocation);
            return Ok(());
        }

        state.sync_running = true;
        drop(state);
        let _guard = SyncGuard(&self.state);

        info!("TASK[{}]: running {}", self.name, invocation);
        let outcome =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| function(&command.kwargs)));
        let message = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => {
                warn!("TASK[{}]: {} failed: {:#}", self.name, invocation, e);
                e.to_string()
            }
            Err(_) => {
                error!("TASK[{}]: {} panicked", self.name, invocation);
                PANIC_MESSAGE.to_string()
            }
        };
        Err(DispatchError::Failed(message))
    }

    fn spawn_function(
        &self,
        function: TaskFn,
        kwargs: Kwargs,
        invocation: String,
    ) -> Result<JoinHandle<()>, DispatchError> {
        let task = self.name.clone();
        let last_failure = Arc::clone(&self.last_failure);

        std::thread::Builder::new()
            .name(format!("task-{task}"))
            .spawn(move || {
                let outcome =
                    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| function(&kwargs)));
                let message = match outcome {
                    Ok(Ok(())) => {
                        info!("TASK[{}]: {} finished", task, invocation);
                        return;
                    }
                    Ok(Err(e)) => format!("{e:#}"),
                    Err(_) => PANIC_MESSAGE.to_string(),
                };
                error!("TASK[{}]: {} failed: {}", task, invocation, message);
                *last_failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(TaskFailure {
                    timestamp: SystemTime::now(),
                    command: invocation,
                    message,
                });
            })
            .map_err(|e| {
                error!("TASK[{}]: cannot spawn thread: {}", self.name, e);
                DispatchError::Failed(e.to_string())
            })
    }

    /// Whether a function is running right now.
    pub fn is_command_running(&self) -> bool {
        self.lock_state().is_busy()
    }

    /// Every accepted invocation, oldest first.
    pub fn command_history(&self) -> Vec<HistoryEntry> {
        self.lock_state().history.clone()
    }

    /// Most recent failure of an async function.
    pub fn last_failure(&self) -> Option<TaskFailure> {
        self.last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn catalog(&self) -> &ChannelCatalog {
        &self.catalog
    }

    pub fn scan(&self) -> Vec<ChannelInfo> {
        self.catalog.scan()
    }

    pub fn get_channels(&self) -> Vec<ChannelInfo> {
        self.catalog.get_channels()
    }

    pub fn get_data(&self, channel: &str) -> Option<Value> {
        self.catalog.get_data(channel)
    }

    /// Wait for any in-flight async function. Does not interrupt it.
    pub fn shutdown(&self) {
        let thread = self.lock_state().command_thread.take();
        if let Some(thread) = thread {
            if !thread.is_finished() {
                info!("TASK[{}]: waiting for running command", self.name);
            }
            let _ = thread.join();
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TaskModule {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TaskModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskModule")
            .field("name", &self.name)
            .field("functions", &self.function_names())
            .finish_non_exhaustive()
    }
}
