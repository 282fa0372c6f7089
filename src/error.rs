//! Unified error types for the slow-control plane.
//!
//! One small enum per subsystem, each with a hand-written `Display`, and a
//! top-level [`Error`] every subsystem converts into. Protocol and dispatch
//! errors are almost never propagated to the process: the link and the task
//! module turn them into wire replies or structured results. [`Error`] exists
//! for setup paths (binding the server, loading config) where `?` is the
//! natural shape.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum Error {
    /// A path did not resolve to a node.
    Address(AddressError),
    /// The byte stream could not be framed into a command line.
    Framing(FramingError),
    /// A task call could not be dispatched.
    Dispatch(DispatchError),
    /// A node failed to read or write.
    Node(NodeError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Socket setup or accept failure.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(e) => write!(f, "address: {e}"),
            Self::Framing(e) => write!(f, "framing: {e}"),
            Self::Dispatch(e) => write!(f, "dispatch: {e}"),
            Self::Node(e) => write!(f, "node: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Io(e) => write!(f, "io: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Addressing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Some segment of `path` is not registered at its level.
    NotFound { path: String },
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { path } => write!(f, "no such node: {path}"),
        }
    }
}

impl std::error::Error for AddressError {}

impl From<AddressError> for Error {
    fn from(e: AddressError) -> Self {
        Self::Address(e)
    }
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    /// The line is not valid UTF-8. Unrecoverable for the connection.
    InvalidEncoding,
    /// The line exceeded the line buffer and was dropped.
    LineTooLong,
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEncoding => write!(f, "line is not valid UTF-8"),
            Self::LineTooLong => write!(f, "line exceeds buffer capacity"),
        }
    }
}

impl std::error::Error for FramingError {}

impl From<FramingError> for Error {
    fn from(e: FramingError) -> Self {
        Self::Framing(e)
    }
}

// ---------------------------------------------------------------------------
// Task dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A previous command of this task is still running.
    Busy,
    /// The function is not in this task's namespace.
    WrongNamespace,
    /// The task has no function of this name.
    UndefinedFunction(String),
    /// No `name()` key was present in the parameters.
    NoFunctionSpecified,
    /// A synchronous task function returned an error.
    Failed(String),
}

impl DispatchError {
    /// Whether another task module might still handle the call.
    ///
    /// Unhandled calls map to `None` on the task call interface rather than
    /// an error object, so a router can keep looking.
    pub fn is_unhandled(&self) -> bool {
        matches!(self, Self::WrongNamespace | Self::NoFunctionSpecified)
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "command already running"),
            Self::WrongNamespace => write!(f, "function not in task namespace"),
            Self::UndefinedFunction(name) => write!(f, "undefined function: {name}"),
            Self::NoFunctionSpecified => write!(f, "no function specified"),
            Self::Failed(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<DispatchError> for Error {
    fn from(e: DispatchError) -> Self {
        Self::Dispatch(e)
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// The node refuses writes. Nodes only return this when they opt in;
    /// the default `set` silently ignores writes.
    ReadOnly,
    /// The written value has the wrong shape for this node.
    InvalidValue(String),
    /// The underlying instrument failed.
    Io(String),
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "node is read-only"),
            Self::InvalidValue(msg) => write!(f, "invalid value: {msg}"),
            Self::Io(msg) => write!(f, "instrument I/O: {msg}"),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<NodeError> for Error {
    fn from(e: NodeError) -> Self {
        Self::Node(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Io(std::io::Error),
    /// The config file is not valid JSON for [`ServerConfig`](crate::config::ServerConfig).
    Parse(serde_json::Error),
    /// A field failed range validation.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read config: {e}"),
            Self::Parse(e) => write!(f, "cannot parse config: {e}"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, Error>;
