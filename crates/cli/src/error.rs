use engine_config::error::ConfigError;
use engine_runtime::error::TransitError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid env file: {0}")]
    EnvFile(String),

    #[error("Failed to run the transit: {0}")]
    Transit(TransitError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Collection '{0}' is not configured")]
    UnknownCollection(String),

    #[error("Shutdown requested")]
    ShutdownRequested,
}

impl From<TransitError> for CliError {
    fn from(err: TransitError) -> Self {
        if err.is_cancelled() {
            CliError::ShutdownRequested
        } else {
            CliError::Transit(err)
        }
    }
}
