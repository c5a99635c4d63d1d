use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Environment variable '{0}' referenced by the configuration is not set")]
    MissingVariable(String),

    #[error("Unterminated variable placeholder in '{0}'")]
    UnterminatedPlaceholder(String),

    #[error("At least one collection must be configured")]
    NoCollections,

    #[error("Collection '{0}' is configured more than once")]
    DuplicateCollection(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid forced checkpoint '{value}' for collection '{collection}': {source}")]
    InvalidCheckpoint {
        collection: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
