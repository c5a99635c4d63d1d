use super::substitute::substitute_tree;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path};
use tracing::debug;

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_RETRY_WORKERS: usize = 2;
pub const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_CYCLE_DELAY_SECS: u64 = 60;

/// Transit configuration as written in the JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitConfig {
    pub source: ConnectionConfig,
    pub destination: ConnectionConfig,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_retry_workers")]
    pub retry_workers: usize,

    /// Batches buffered between reader and writers; the effective worker count when unset
    #[serde(default)]
    pub channel_capacity: Option<usize>,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default = "default_progress_interval")]
    pub progress_interval_secs: u64,

    /// Repeat the transit of every collection until shutdown
    #[serde(default, rename = "loop")]
    pub run_loop: bool,

    #[serde(default = "default_cycle_delay")]
    pub cycle_delay_secs: u64,

    pub collections: Vec<CollectionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionConfig {
    pub name: String,

    #[serde(default)]
    pub key_fields: Vec<String>,

    #[serde(default = "default_upsert")]
    pub upsert: bool,

    #[serde(default)]
    pub fetch_key_from_destination: bool,

    #[serde(default)]
    pub batch_size: Option<usize>,

    #[serde(default)]
    pub workers: Option<usize>,

    #[serde(default)]
    pub retry_workers: Option<usize>,

    #[serde(default)]
    pub iterative: Option<IterativeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IterativeConfig {
    pub field: String,

    #[serde(default)]
    pub offset_secs: u64,

    /// RFC 3339 timestamp used instead of the destination checkpoint
    #[serde(default)]
    pub force_checkpoint: Option<String>,
}

impl TransitConfig {
    /// Reads the file at `path`, substituting `${NAME}` placeholders from `vars`.
    pub fn load(
        path: impl AsRef<Path>,
        vars: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_json(&text, vars)
    }

    pub fn from_json(text: &str, vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut tree: serde_json::Value = serde_json::from_str(text)?;
        substitute_tree(&mut tree, vars)?;
        Ok(serde_json::from_value(tree)?)
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_retry_workers() -> usize {
    DEFAULT_RETRY_WORKERS
}

fn default_progress_interval() -> u64 {
    DEFAULT_PROGRESS_INTERVAL_SECS
}

fn default_cycle_delay() -> u64 {
    DEFAULT_CYCLE_DELAY_SECS
}

fn default_upsert() -> bool {
    true
}
