//! slowctl: slow-control command plane.
//!
//! Exposes the instrument node tree, the line protocol, the TCP connection
//! server and the task dispatcher as a library so that the binary, the
//! integration tests and the fuzz targets share one implementation.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  server            TCP accept loop, one Link per client      │
//! │     │                                                        │
//! │  protocol          framer → resolver → bridge                │
//! │     │                                                        │
//! │  control           NodeTree of ControlNodes, plugins         │
//! │                                                              │
//! │  task              TaskModule · TaskRouter · ChannelCatalog  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![deny(unused_must_use)]

pub mod config;
pub mod control;
pub mod error;
pub mod protocol;
pub mod server;
pub mod task;

pub use error::{Error, Result};
