#![allow(dead_code)]

use bson::{DateTime, Document, doc};
use engine_config::settings::{TransitConfig, TransitSettings};
use engine_core::{retry::RetryPolicy, testing::MemoryCollection};
use engine_runtime::{
    error::TransitError,
    execution::{Repositories, RepositoryFactory, TransitExecutor, TransitReport},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio_util::sync::CancellationToken;

/// Source and destination collections held in memory, created on first use.
#[derive(Clone, Default)]
pub struct MemoryFactory {
    collections: Arc<Mutex<HashMap<String, (MemoryCollection, MemoryCollection)>>>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(
        self,
        name: &str,
        source: impl IntoIterator<Item = Document>,
        destination: impl IntoIterator<Item = Document>,
    ) -> Self {
        let source = MemoryCollection::new(name).with_documents(source);
        let destination = MemoryCollection::new(name).with_documents(destination);
        self.collections
            .lock()
            .unwrap()
            .insert(name.to_string(), (source, destination));
        self
    }

    pub fn source(&self, name: &str) -> MemoryCollection {
        self.pair(name).0
    }

    pub fn destination(&self, name: &str) -> MemoryCollection {
        self.pair(name).1
    }

    fn pair(&self, name: &str) -> (MemoryCollection, MemoryCollection) {
        self.collections
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_insert_with(|| (MemoryCollection::new(name), MemoryCollection::new(name)))
            .clone()
    }
}

impl RepositoryFactory for MemoryFactory {
    fn repositories(&self, collection: &str) -> Repositories {
        let (source, destination) = self.pair(collection);
        Repositories {
            source: Arc::new(source),
            destination: Arc::new(destination.clone()),
            key_finder: Arc::new(destination),
        }
    }
}

/// Wraps a `collections` array into a complete configuration.
pub fn config_json(collections: &str, extra: &str) -> String {
    format!(
        r#"{{
            "source": {{ "uri": "mongodb://source:27017", "database": "app" }},
            "destination": {{ "uri": "mongodb://destination:27017", "database": "app_copy" }},
            "workers": 3,
            "retry_workers": 2,
            "batch_size": 64,
            {extra}
            "collections": {collections}
        }}"#
    )
}

pub fn settings(collections: &str, extra: &str) -> TransitSettings {
    let config = TransitConfig::from_json(&config_json(collections, extra), &HashMap::new())
        .expect("parse config");
    TransitSettings::from_config(config).expect("validate config")
}

/// Runs the executor with instant retries.
pub async fn run_transit(
    settings: TransitSettings,
    factory: &MemoryFactory,
    cancel: CancellationToken,
) -> Result<TransitReport, TransitError> {
    TransitExecutor::new(settings, Arc::new(factory.clone()), cancel)
        .with_retry(RetryPolicy::new(2, Duration::ZERO, Duration::ZERO))
        .execute()
        .await
}

pub fn at(secs: i64) -> DateTime {
    DateTime::from_millis(secs * 1000)
}

/// Documents `_id` in `ids`, each with a `Modified` timestamp.
pub fn modified_documents(ids: std::ops::Range<i32>, modified: DateTime) -> Vec<Document> {
    ids.map(|i| doc! { "_id": i, "sku": format!("SKU-{i}"), "Modified": modified })
        .collect()
}

pub fn plain_documents(n: i32) -> Vec<Document> {
    (0..n).map(|i| doc! { "_id": i, "name": format!("doc-{i}") }).collect()
}

pub const RELOCATION: &str = concat!(
    "Document shard key value updates that cause the doc to move shards ",
    "must be sent with write batch of size 1"
);
