//! Control plugins: explicit registration of node factories.
//!
//! A plugin is a named bundle of node factories, typically one instrument
//! family. How a plugin is found (a search path, a static list, a build
//! feature) is up to the host; the tree only needs the plugin to register
//! itself through [`ControlPlugin::register`].

use super::tree::NodeTree;

/// A set of node factories contributed to a [`NodeTree`].
pub trait ControlPlugin {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Register this plugin's factories on `tree`.
    fn register(&self, tree: &NodeTree);
}
