//! Node tree: a runtime-extensible namespace of control nodes.
//!
//! ```text
//!   NodeTree (root)
//!     ├── "SRC1" ──▶ factory ──▶ NodeTree
//!     │                            ├── "OUTPUT" ──▶ factory ──▶ ValueNode
//!     │                            └── "FREQ"   ──▶ factory ──▶ ConstNode
//!     └── "DMM"  ──▶ factory ──▶ ...
//! ```
//!
//! Each level maps an upper-cased name to a [`NodeFactory`]. Resolving a
//! path invokes the factory of the first segment on this tree, then asks
//! each produced node for its [`child`](ControlNode::child) by the next
//! segment. Because `NodeTree` is itself a [`ControlNode`], trees nest to any
//! depth.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;
use serde_json::Value;

use super::node::ControlNode;
use super::plugin::ControlPlugin;
use crate::error::{AddressError, NodeError};

/// Produces a node (or sub-tree) from construction arguments.
pub type NodeFactory = Arc<dyn Fn(&[Value]) -> Arc<dyn ControlNode> + Send + Sync>;

/// Normalise a name or path segment: trimmed, upper-cased.
pub fn normalize(segment: &str) -> String {
    segment.trim().to_uppercase()
}

/// Mutable registry of named node factories.
#[derive(Default)]
pub struct NodeTree {
    factories: RwLock<HashMap<String, NodeFactory>>,
}

impl NodeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn(&[Value]) -> Arc<dyn ControlNode> + Send + Sync + 'static,
    {
        let key = normalize(name);
        let prev = self
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), Arc::new(factory));
        if prev.is_some() {
            debug!("TREE: replaced factory '{}'", key);
        } else {
            debug!("TREE: registered factory '{}'", key);
        }
    }

    /// Register a single shared node; every resolution returns this same
    /// instance.
    pub fn register_node(&self, name: &str, node: Arc<dyn ControlNode>) {
        self.register(name, move |_| Arc::clone(&node));
    }

    /// Register a nested tree under `name` and return it for population.
    pub fn add_subtree(&self, name: &str) -> Arc<NodeTree> {
        let tree = Arc::new(NodeTree::new());
        self.register_node(name, Arc::clone(&tree) as Arc<dyn ControlNode>);
        tree
    }

    /// Let a plugin register its factories on this tree.
    pub fn load_plugin(&self, plugin: &dyn ControlPlugin) {
        debug!("TREE: loading plugin '{}'", plugin.name());
        plugin.register(self);
    }

    /// Invoke the factory registered under `name` with `args`.
    pub fn create(&self, name: &str, args: &[Value]) -> Option<Arc<dyn ControlNode>> {
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize(name))
            .cloned()?;
        // Run the factory outside the lock: it may itself register nodes.
        Some(factory(args))
    }

    /// Whether `name` is registered at this level.
    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&normalize(name))
    }

    /// Registered names at this level, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Walk `path` from this tree down to a node.
    pub fn resolve<S: AsRef<str>>(&self, path: &[S]) -> Result<Arc<dyn ControlNode>, AddressError> {
        let not_found = || AddressError::NotFound {
            path: path
                .iter()
                .map(|s| normalize(s.as_ref()))
                .collect::<Vec<_>>()
                .join(":"),
        };

        let (first, rest) = path.split_first().ok_or_else(not_found)?;
        let mut node = self.create(first.as_ref(), &[]).ok_or_else(not_found)?;
        for segment in rest {
            node = node.child(&normalize(segment.as_ref())).ok_or_else(not_found)?;
        }
        Ok(node)
    }

    /// Resolve a dotted path such as `"SRC1.FREQ"` (also accepts `:`).
    pub fn resolve_str(&self, path: &str) -> Result<Arc<dyn ControlNode>, AddressError> {
        let segments: Vec<&str> = path.split(['.', ':']).collect();
        self.resolve(&segments)
    }

    /// Read the node at `path`.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> crate::Result<Value> {
        Ok(self.resolve(path)?.get()?)
    }

    /// Write the node at `path`.
    pub fn set_path<S: AsRef<str>>(&self, path: &[S], value: &Value) -> crate::Result<()> {
        self.resolve(path)?.set(value)?;
        Ok(())
    }
}

impl ControlNode for NodeTree {
    fn get(&self) -> Result<Value, NodeError> {
        Ok(Value::Null)
    }

    fn child(&self, name: &str) -> Option<Arc<dyn ControlNode>> {
        self.create(name, &[])
    }
}

impl core::fmt::Debug for NodeTree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NodeTree").field("names", &self.names()).finish()
    }
}
