use engine_core::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("Document reading was cancelled")]
    Cancelled,

    #[error("Failed to read from source collection '{collection}': {source}")]
    Read {
        collection: String,
        #[source]
        source: RepositoryError,
    },

    #[error("Failed to look up destination key for document {id}: {source}")]
    KeyLookup {
        id: String,
        #[source]
        source: RepositoryError,
    },

    #[error("The transit channel was closed before all batches were sent")]
    ChannelClosed,
}

impl ProducerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProducerError::Cancelled)
    }
}

#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("Document writing was cancelled")]
    Cancelled,

    #[error("Retry channel closed while forwarding document {id}")]
    RetryChannelClosed { id: String },

    /// A worker task panicked or was aborted.
    #[error("Worker task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ConsumerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConsumerError::Cancelled)
    }
}
