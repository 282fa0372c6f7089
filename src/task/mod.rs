//! User task modules and their exported channels.
//!
//! A [`TaskModule`] owns named functions invoked through a flat JSON
//! mapping with one `<task>.<fn>()` key. A [`TaskRouter`] offers each call
//! to its modules in order. Each module's [`ChannelCatalog`] lists the
//! nodes it exports for viewers.

pub mod catalog;
pub mod module;
pub mod router;

pub use catalog::{ChannelCatalog, ChannelInfo, ChannelKind, ExportFn};
pub use module::{
    CommandDescriptor, CommandProcessor, HistoryEntry, Kwargs, TaskFailure, TaskFn, TaskModule,
};
pub use router::TaskRouter;
