use std::time::Duration;
use thiserror::Error;

/// Structural problems with a dataset, its batches, or the translated columns.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DatasetError {
    #[error("Batch size must be greater than zero")]
    InvalidBatchSize,

    #[error("Column not found in dataset: {0}")]
    MissingColumn(String),

    #[error("Column already exists: {0}")]
    ColumnCollision(String),

    #[error("Column '{column}' has {got} rows, expected {expected}")]
    RowCountMismatch {
        column: String,
        expected: usize,
        got: usize,
    },

    #[error("Expected {expected} batch results, got {got}")]
    ResultCountMismatch { expected: usize, got: usize },

    #[error("Batch {batch} result does not match its input: {reason}")]
    ShapeMismatch { batch: usize, reason: String },
}

/// Failures of the parallel dispatcher. Every variant is fatal to the run.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Concurrency ceiling must be at least 1")]
    InvalidConcurrency,

    #[error("Unit {unit} timed out after {timeout:?}")]
    Timeout { unit: usize, timeout: Duration },

    #[error("Unit {unit} failed: {reason}")]
    UnitFailed { unit: usize, reason: String },
}
