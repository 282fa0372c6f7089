//! Line-oriented command protocol.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     Protocol Stack                         │
//! │                                                            │
//! │  ┌──────────┐   ┌──────────────┐   ┌───────────────────┐  │
//! │  │  Framer  │──▶│ PathResolver │──▶│  ProtocolBridge   │  │
//! │  │ (bytes → │   │ (clauses,    │   │  → Instrument-    │  │
//! │  │  lines)  │   │  session)    │   │    Handler        │  │
//! │  └──────────┘   └──────────────┘   └───────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Grammar of one line:
//!
//! ```text
//! line      := clause (";" clause)*
//! clause    := address SP params
//! address   := (":" segment (":" segment)*) | (segment (":" segment)*)
//! params    := token (SP token)*
//! segment   := [^:\s;]+
//! ```

pub mod bridge;
pub mod framer;
pub mod resolver;

pub use bridge::{InstrumentHandler, ProtocolBridge, TreeHandler};
pub use framer::CommandFramer;
pub use resolver::{CommandClause, PathResolver};
