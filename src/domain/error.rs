//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violations of the tree model or the session format.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("malformed session line {line}: {reason}")]
    MalformedSession { line: usize, reason: String },

    #[error("session ended after line {line}, expected {expected} more child line(s)")]
    TruncatedSession { expected: usize, line: usize },

    #[error("node no longer exists in the tree")]
    UnknownNode,

    #[error("the root node has no backing note and cannot be edited")]
    RootNotEditable,
}
