//! Control-node tree: the addressing model.
//!
//! Every instrument setting, readback, and exported task channel is a
//! [`ControlNode`]. Nodes live in a [`NodeTree`], which maps names to node
//! factories and resolves colon- or dot-delimited paths at runtime.
//! Plugins contribute factories through [`ControlPlugin`].

pub mod node;
pub mod nodes;
pub mod plugin;
pub mod tree;

pub use node::{ControlNode, ControlNodeExt};
pub use plugin::ControlPlugin;
pub use tree::{NodeFactory, NodeTree};
