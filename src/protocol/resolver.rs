//! Hierarchical address resolution with path inheritance.
//!
//! A line is split on `;` into clauses, each `address param param ...`.
//! Addresses starting with `:` are absolute. Any other address is relative:
//! it replaces only the last segment of the previously resolved path, so a
//! session can narrow scope once and issue sibling commands:
//!
//! ```text
//!   :SRC1:FREQ 1000   ──▶  SRC1:FREQ
//!   AMPL 0.5          ──▶  SRC1:AMPL       (inherits SRC1)
//!   :OUTP ON          ──▶  OUTP            (absolute reset)
//! ```
//!
//! The resolver is per-connection state; its path survives across lines.

use core::fmt;

/// One resolved clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandClause {
    /// Upper-cased, trimmed path segments.
    pub path: Vec<String>,
    /// Raw parameter tokens.
    pub params: Vec<String>,
}

impl CommandClause {
    /// Whether the clause is a query (last segment ends in `?`).
    pub fn is_query(&self) -> bool {
        self.path.last().is_some_and(|s| s.ends_with('?'))
    }
}

impl fmt::Display for CommandClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.join(":"))?;
        for p in &self.params {
            write!(f, " {p}")?;
        }
        Ok(())
    }
}

/// Per-connection clause parser.
#[derive(Debug, Default, Clone)]
pub struct PathResolver {
    last_path: Vec<String>,
}

impl PathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the most recently resolved clause.
    pub fn last_path(&self) -> &[String] {
        &self.last_path
    }

    /// Resolve one clause, updating the session path.
    ///
    /// Returns `None` for an empty clause, which leaves the path untouched.
    pub fn resolve_clause(&mut self, clause: &str) -> Option<CommandClause> {
        let mut tokens = clause.split_whitespace();
        let address = tokens.next()?;
        let params: Vec<String> = tokens.map(str::to_owned).collect();

        let mut path = match address.strip_prefix(':') {
            Some(absolute) => split_segments(absolute),
            None => {
                let mut inherited = self.last_path.clone();
                inherited.pop();
                inherited.extend(split_segments(address));
                inherited
            }
        };
        path.iter_mut().for_each(|s| *s = s.trim().to_uppercase());

        self.last_path.clone_from(&path);
        Some(CommandClause { path, params })
    }

    /// Resolve every clause of `line`, in order.
    ///
    /// The iterator is lazy: the session path advances as clauses are
    /// pulled, so callers can act on each clause before the next resolves.
    pub fn clauses<'a>(&'a mut self, line: &'a str) -> impl Iterator<Item = CommandClause> + 'a {
        line.split(';').filter_map(move |c| self.resolve_clause(c))
    }

    /// Forget the session path.
    pub fn reset(&mut self) {
        self.last_path.clear();
    }
}

fn split_segments(address: &str) -> Vec<String> {
    address.split(':').map(str::to_owned).collect()
}
