//! Terminator-delimited line framer.
//!
//! Wire format:
//! ```text
//! ┌──────────────────────────────┬────────────┐
//! │ UTF-8 command text (N bytes) │ terminator │
//! │                              │ (1 byte)   │
//! └──────────────────────────────┴────────────┘
//! ```
//!
//! The framer accumulates bytes and yields complete lines. Only the
//! configured terminator ends a line; any other `\r` or `\n` byte is
//! dropped, so a `\n`-terminated session tolerates CRLF clients and a
//! `\r`-terminated one tolerates LF. A single socket read may carry part
//! of a line or several lines.

use heapless::Vec;

use crate::error::FramingError;

/// Maximum line length in bytes (protects against memory exhaustion).
pub const MAX_LINE_LEN: usize = 4096;

/// Default terminator (LF).
pub const DEFAULT_TERMINATOR: u8 = b'\n';

/// Streaming line framer.
pub struct CommandFramer {
    terminator: u8,
    line: Vec<u8, MAX_LINE_LEN>,
    /// Set when the current line overflowed; cleared at the next terminator.
    overflowed: bool,
}

impl Default for CommandFramer {
    fn default() -> Self {
        Self::new(DEFAULT_TERMINATOR)
    }
}

impl CommandFramer {
    pub fn new(terminator: u8) -> Self {
        Self {
            terminator,
            line: Vec::new(),
            overflowed: false,
        }
    }

    pub fn terminator(&self) -> u8 {
        self.terminator
    }

    /// Feed one byte.
    ///
    /// Returns `Some` when the byte completed a line: the decoded text, or
    /// the reason the line was rejected.
    pub fn push(&mut self, byte: u8) -> Option<Result<String, FramingError>> {
        if byte == self.terminator {
            return Some(self.take_line());
        }
        if byte == b'\n' || byte == b'\r' {
            return None;
        }
        if self.line.push(byte).is_err() {
            self.overflowed = true;
        }
        None
    }

    /// Feed a chunk, collecting every line it completes.
    pub fn feed(&mut self, data: &[u8]) -> std::vec::Vec<Result<String, FramingError>> {
        data.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Number of buffered bytes of the current, unterminated line.
    pub fn pending(&self) -> usize {
        self.line.len()
    }

    /// Drop any partial line (e.g. after the peer closes).
    pub fn reset(&mut self) {
        self.line.clear();
        self.overflowed = false;
    }

    fn take_line(&mut self) -> Result<String, FramingError> {
        let overflowed = self.overflowed;
        let result = if overflowed {
            Err(FramingError::LineTooLong)
        } else {
            core::str::from_utf8(&self.line)
                .map(str::to_owned)
                .map_err(|_| FramingError::InvalidEncoding)
        };
        self.reset();
        result
    }
}
