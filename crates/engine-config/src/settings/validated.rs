use super::file::{CollectionConfig, ConnectionConfig, TransitConfig};
use crate::error::ConfigError;
use bson::DateTime;
use model::execution::prepare::IterativeOptions;
use std::{collections::HashSet, time::Duration};

/// Immutable, validated configuration of a whole transit run.
#[derive(Debug, Clone)]
pub struct TransitSettings {
    pub source: ConnectionConfig,
    pub destination: ConnectionConfig,
    /// Whether this is a dry run (nothing written to the destination)
    pub dry_run: bool,
    pub progress_interval: Duration,
    /// Whether transits repeat until shutdown
    pub run_loop: bool,
    pub cycle_delay: Duration,
    pub collections: Vec<CollectionSettings>,
}

/// Effective settings of one collection, with global defaults applied.
#[derive(Debug, Clone)]
pub struct CollectionSettings {
    pub name: String,
    pub key_fields: Vec<String>,
    pub upsert: bool,
    pub fetch_key_from_destination: bool,
    pub batch_size: usize,
    pub workers: usize,
    pub retry_workers: usize,
    pub channel_capacity: usize,
    /// Full mode when absent
    pub iterative: Option<IterativeOptions>,
}

impl CollectionSettings {
    pub fn is_iterative(&self) -> bool {
        self.iterative.is_some()
    }
}

impl TransitSettings {
    pub fn from_config(config: TransitConfig) -> Result<Self, ConfigError> {
        if config.collections.is_empty() {
            return Err(ConfigError::NoCollections);
        }

        check_connection("source", &config.source)?;
        check_connection("destination", &config.destination)?;
        check_positive("batch_size", config.batch_size)?;
        check_positive("workers", config.workers)?;
        check_positive("retry_workers", config.retry_workers)?;
        if let Some(capacity) = config.channel_capacity {
            check_positive("channel_capacity", capacity)?;
        }
        if config.progress_interval_secs == 0 {
            return Err(ConfigError::invalid("progress_interval_secs", "must be greater than zero"));
        }

        let mut seen = HashSet::new();
        let mut collections = Vec::with_capacity(config.collections.len());
        for collection in &config.collections {
            let name = collection.name.trim();
            if !name.is_empty() && !seen.insert(name) {
                return Err(ConfigError::DuplicateCollection(name.to_string()));
            }
            collections.push(resolve_collection(&config, collection)?);
        }

        Ok(Self {
            source: config.source,
            destination: config.destination,
            dry_run: config.dry_run,
            progress_interval: Duration::from_secs(config.progress_interval_secs),
            run_loop: config.run_loop,
            cycle_delay: Duration::from_secs(config.cycle_delay_secs),
            collections,
        })
    }

    /// Forces dry-run mode on; never turns it off.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run |= dry_run;
        self
    }

    /// Forces loop mode on; never turns it off.
    pub fn with_loop(mut self, run_loop: bool) -> Self {
        self.run_loop |= run_loop;
        self
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionSettings> {
        self.collections.iter().find(|c| c.name == name)
    }
}

fn resolve_collection(
    global: &TransitConfig,
    collection: &CollectionConfig,
) -> Result<CollectionSettings, ConfigError> {
    let name = collection.name.trim();
    if name.is_empty() {
        return Err(ConfigError::invalid("collections[].name", "must not be empty"));
    }
    let scoped = |field: &str| format!("collections[{name}].{field}");

    if collection.key_fields.iter().any(|f| f.trim().is_empty()) {
        return Err(ConfigError::invalid(scoped("key_fields"), "must not contain empty names"));
    }

    let batch_size = collection.batch_size.unwrap_or(global.batch_size);
    let workers = collection.workers.unwrap_or(global.workers);
    let retry_workers = collection.retry_workers.unwrap_or(global.retry_workers);
    check_positive(&scoped("batch_size"), batch_size)?;
    check_positive(&scoped("workers"), workers)?;
    check_positive(&scoped("retry_workers"), retry_workers)?;

    let iterative = match &collection.iterative {
        None => None,
        Some(iterative) => {
            if iterative.field.trim().is_empty() {
                return Err(ConfigError::invalid(scoped("iterative.field"), "must not be empty"));
            }

            let mut options = IterativeOptions::new(iterative.field.trim())
                .with_offset(Duration::from_secs(iterative.offset_secs));
            if let Some(value) = &iterative.force_checkpoint {
                options = options.with_forced_checkpoint(parse_checkpoint(name, value)?);
            }
            Some(options)
        }
    };

    Ok(CollectionSettings {
        name: name.to_string(),
        key_fields: collection.key_fields.clone(),
        upsert: collection.upsert,
        fetch_key_from_destination: collection.fetch_key_from_destination,
        batch_size,
        workers,
        retry_workers,
        channel_capacity: global.channel_capacity.unwrap_or(workers),
        iterative,
    })
}

fn parse_checkpoint(collection: &str, value: &str) -> Result<DateTime, ConfigError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|parsed| DateTime::from_chrono(parsed.with_timezone(&chrono::Utc)))
        .map_err(|source| ConfigError::InvalidCheckpoint {
            collection: collection.to_string(),
            value: value.to_string(),
            source,
        })
}

fn check_connection(field: &str, connection: &ConnectionConfig) -> Result<(), ConfigError> {
    if connection.uri.trim().is_empty() {
        return Err(ConfigError::invalid(format!("{field}.uri"), "must not be empty"));
    }
    if connection.database.trim().is_empty() {
        return Err(ConfigError::invalid(format!("{field}.database"), "must not be empty"));
    }
    Ok(())
}

fn check_positive(field: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(field, "must be greater than zero"));
    }
    Ok(())
}
