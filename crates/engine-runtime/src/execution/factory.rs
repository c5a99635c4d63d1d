use crate::error::TransitError;
use connectors::mongo::MongoConnection;
use engine_config::settings::TransitSettings;
use engine_core::connectors::{
    destination::{DestinationRepository, KeyFinder},
    source::SourceRepository,
};
use std::sync::Arc;

/// Repositories serving one collection.
#[derive(Clone)]
pub struct Repositories {
    pub source: Arc<dyn SourceRepository>,
    pub destination: Arc<dyn DestinationRepository>,
    /// Destination lookups by `_id`, used when keys are fetched from the destination
    pub key_finder: Arc<dyn KeyFinder>,
}

/// Hands out the repositories for a collection name.
pub trait RepositoryFactory: Send + Sync {
    fn repositories(&self, collection: &str) -> Repositories;
}

/// Source and destination MongoDB deployments.
pub struct MongoRepositoryFactory {
    source: MongoConnection,
    destination: MongoConnection,
}

impl MongoRepositoryFactory {
    pub async fn connect(settings: &TransitSettings) -> Result<Self, TransitError> {
        let (source, destination) = tokio::try_join!(
            MongoConnection::connect(&settings.source.uri, &settings.source.database),
            MongoConnection::connect(&settings.destination.uri, &settings.destination.database),
        )?;

        Ok(Self {
            source,
            destination,
        })
    }

    pub async fn shutdown(self) {
        tokio::join!(self.source.shutdown(), self.destination.shutdown());
    }
}

impl RepositoryFactory for MongoRepositoryFactory {
    fn repositories(&self, collection: &str) -> Repositories {
        let destination = Arc::new(self.destination.destination(collection));
        Repositories {
            source: Arc::new(self.source.source(collection)),
            destination: destination.clone(),
            key_finder: destination,
        }
    }
}
