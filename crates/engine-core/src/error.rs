use thiserror::Error;

/// Errors raised by the source and destination repositories.
#[derive(Error, Debug, Clone)]
pub enum RepositoryError {
    /// Network, server selection or pool errors that may succeed when repeated.
    #[error("Transient repository error: {0}")]
    Transient(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Checkpoint field '{field}' holds a non-datetime value: {value}")]
    InvalidCheckpoint { field: String, value: String },
}

impl RepositoryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Transient(_))
    }
}

/// A single failed item of an unordered bulk write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkWriteFailure {
    /// Position of the item in the submitted batch.
    pub index: usize,
    pub code: i32,
    pub message: String,
}

impl BulkWriteFailure {
    pub fn new(index: usize, code: i32, message: impl Into<String>) -> Self {
        Self {
            index,
            code,
            message: message.into(),
        }
    }
}

/// Outcome of a failed bulk write.
#[derive(Error, Debug, Clone)]
pub enum WriteError {
    /// Some items failed; items not listed were written.
    #[error("Bulk write failed for {} item(s)", failures.len())]
    Bulk { failures: Vec<BulkWriteFailure> },

    /// The whole request failed without per-item details.
    #[error(transparent)]
    Other(#[from] RepositoryError),
}
