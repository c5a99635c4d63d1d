use thiserror::Error;

/// Errors happening during client or connection setup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The driver rejected the connection string or could not build the client.
    #[error("MongoDB client creation failed: {0}")]
    Client(#[from] mongodb::error::Error),

    /// The server did not answer the initial ping.
    #[error("MongoDB server at '{host}' is unreachable: {source}")]
    Unreachable {
        host: String,
        #[source]
        source: mongodb::error::Error,
    },
}
