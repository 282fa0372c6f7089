//! Channel catalog: discovery of a task's exported nodes.
//!
//! A task may export `(name, node)` pairs for external viewers. Each is
//! classified once by reading it:
//!
//! | `node.get()` returns           | kind     |
//! |--------------------------------|----------|
//! | object with a `table` key      | `table`  |
//! | any other object               | `tree`   |
//! | anything else                  | untyped  |
//!
//! Viewers pick a renderer from the `tree`/`table` marker, so
//! [`ChannelCatalog::get_data`] keeps structured values as objects and
//! stringifies everything else.

use std::sync::{Arc, Mutex, PoisonError};

use log::{error, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::control::node::{ControlNode, value_to_string};

/// Callable producing a task's exported channels.
pub type ExportFn =
    Arc<dyn Fn() -> anyhow::Result<Vec<(String, Arc<dyn ControlNode>)>> + Send + Sync>;

/// Marker key for tabular data.
pub const TABLE_KEY: &str = "table";
/// Marker key for tree-structured data.
pub const TREE_KEY: &str = "tree";

/// Rendering hint for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Tree,
    Table,
}

/// One entry of the channel list, `{"name": ..., "type": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChannelKind>,
}

/// Classify a channel value.
pub fn classify(value: &Value) -> Option<ChannelKind> {
    match value {
        Value::Object(map) if map.contains_key(TABLE_KEY) => Some(ChannelKind::Table),
        Value::Object(_) => Some(ChannelKind::Tree),
        _ => None,
    }
}

/// Shape a channel value for a viewer.
///
/// Scalars use the same string form as protocol replies, so a `null`
/// channel reads as `""`.
pub fn present(value: Value) -> Value {
    match value {
        Value::Object(map) if map.contains_key(TREE_KEY) || map.contains_key(TABLE_KEY) => {
            Value::Object(map)
        }
        Value::Object(map) => {
            let mut wrapped = Map::new();
            wrapped.insert(TREE_KEY.to_string(), Value::Object(map));
            Value::Object(wrapped)
        }
        other => Value::String(value_to_string(&other)),
    }
}

#[derive(Default)]
struct CatalogState {
    exports: Vec<(String, Arc<dyn ControlNode>)>,
    channels: Option<Vec<ChannelInfo>>,
}

/// Exported channels of one task.
pub struct ChannelCatalog {
    owner: String,
    export: Option<ExportFn>,
    state: Mutex<CatalogState>,
}

impl ChannelCatalog {
    pub fn new(owner: impl Into<String>, export: Option<ExportFn>) -> Self {
        Self {
            owner: owner.into(),
            export,
            state: Mutex::new(CatalogState::default()),
        }
    }

    /// Re-run the export callable and classify every channel.
    ///
    /// A missing or failing export callable yields an empty catalog.
    pub fn scan(&self) -> Vec<ChannelInfo> {
        let exports = match &self.export {
            None => Vec::new(),
            Some(export) => match export() {
                Ok(exports) => exports,
                Err(e) => {
                    error!("TASK[{}]: export() failed: {:#}", self.owner, e);
                    Vec::new()
                }
            },
        };

        let channels: Vec<ChannelInfo> = exports
            .iter()
            .map(|(name, node)| {
                let kind = match node.get() {
                    Ok(value) => classify(&value),
                    Err(e) => {
                        warn!("TASK[{}]: channel {} unreadable: {}", self.owner, name, e);
                        None
                    }
                };
                ChannelInfo {
                    name: name.clone(),
                    kind,
                }
            })
            .collect();

        let mut state = self.lock();
        state.exports = exports;
        state.channels = Some(channels.clone());
        channels
    }

    /// Channel list, rescanned on every call.
    pub fn get_channels(&self) -> Vec<ChannelInfo> {
        self.scan()
    }

    /// Whether a scan has run.
    pub fn is_scanned(&self) -> bool {
        self.lock().channels.is_some()
    }

    /// Current value of `channel`, shaped for a viewer.
    ///
    /// Scans first if no scan has run. Returns `None` for unknown channels
    /// and for channels whose read fails.
    pub fn get_data(&self, channel: &str) -> Option<Value> {
        if !self.is_scanned() {
            self.scan();
        }
        let node = self
            .lock()
            .exports
            .iter()
            .find(|(name, _)| name == channel)
            .map(|(_, node)| Arc::clone(node))?;

        // Read outside the lock; nodes may do slow I/O.
        match node.get() {
            Ok(value) => Some(present(value)),
            Err(e) => {
                warn!("TASK[{}]: channel {} unreadable: {}", self.owner, channel, e);
                None
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
