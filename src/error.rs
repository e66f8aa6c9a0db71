//! Error types for building layouts and writing rows.
//!
//! - [`FieldConflictError`] - column names that cannot be arranged into rows
//! - [`LookupError`] - a record is missing data while `raise_on_missing` is set
//! - [`WriteError`] - anything that aborts a write call, including sink failures

use thiserror::Error;

/// Structural conflict between column names, raised while building a writer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldConflictError {
    /// A sibling column expects an array at `depth` but this path has none.
    #[error("{field} conflicts: level {depth} is not an array")]
    NotArray { field: String, depth: usize },

    /// The path reaches an array through a prefix no sibling shares.
    #[error("{field} conflicts with the array at depth {depth}")]
    ArrayPrefix { field: String, depth: usize },

    /// `[id]` is followed by more segments.
    #[error("{field} includes [id] before its last segment")]
    NonTerminalId { field: String },

    /// No array level exists at the depth of `[id]`.
    #[error("{field} does not match any array")]
    NoEnclosingArray { field: String },

    /// An array level exists at the depth of `[id]` but through other prefixes.
    #[error("{field} prefix does not match its array")]
    IdPrefixMismatch { field: String },
}

/// A record lacks the data a column points at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("{field}: key '{key}' not found")]
    MissingKey { field: String, key: String },

    #[error("{field}: index {index} out of range for list of length {len}")]
    IndexOutOfRange { field: String, index: usize, len: usize },

    #[error("{field}: cannot apply '{segment}' to {found}")]
    TypeMismatch {
        field: String,
        segment: String,
        found: &'static str,
    },
}

/// Errors that abort a write call.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("record ids exhausted after {}", u64::MAX)]
    IdOverflow,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
