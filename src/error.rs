//! Crate-wide error types

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors produced while resolving, aligning or evaluating the graph
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("no output source is set on model")]
    NoOutputConfigured,

    #[error("model input graph contains a cycle")]
    CycleDetected,

    #[error("column not found: {0}")]
    MissingColumn(String),

    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("timestamp {0} is missing from series")]
    MissingTimestamp(DateTime<Utc>),

    #[error("time index is not strictly increasing at {0}")]
    UnorderedIndex(DateTime<Utc>),

    #[error("length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("selected model index {0} is out of range")]
    SelectionOutOfRange(i64),

    #[error("estimator is not fitted")]
    NotFitted,

    #[error("{0} is empty")]
    EmptyWindow(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to parse value: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
