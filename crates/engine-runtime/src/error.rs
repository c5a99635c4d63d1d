use connectors::error::ConnectorError;
use engine_core::error::RepositoryError;
use engine_processing::error::{ConsumerError, ProducerError};
use thiserror::Error;

/// Top-level errors of a transit run.
#[derive(Debug, Error)]
pub enum TransitError {
    /// Shutdown was requested while work was in flight.
    #[error("Transit cancelled")]
    Cancelled,

    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// Preparation query failed, after retries for transient errors.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Reader error: {0}")]
    Producer(ProducerError),

    #[error("Writer error: {0}")]
    Consumer(ConsumerError),

    /// An error occurred while joining a task.
    /// This usually indicates that the task panicked.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl TransitError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransitError::Cancelled)
    }
}

impl From<ProducerError> for TransitError {
    fn from(err: ProducerError) -> Self {
        if err.is_cancelled() {
            TransitError::Cancelled
        } else {
            TransitError::Producer(err)
        }
    }
}

impl From<ConsumerError> for TransitError {
    fn from(err: ConsumerError) -> Self {
        if err.is_cancelled() {
            TransitError::Cancelled
        } else {
            TransitError::Consumer(err)
        }
    }
}
