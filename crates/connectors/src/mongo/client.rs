use super::{destination::MongoDestination, source::MongoSource};
use crate::error::ConnectorError;
use bson::{Document, doc};
use mongodb::{Client, Collection, Database};
use tracing::{debug, info};

/// A connected client bound to one database.
#[derive(Clone)]
pub struct MongoConnection {
    client: Client,
    database: Database,
}

impl MongoConnection {
    /// Builds the client and pings the server so a bad URI fails fast.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, ConnectorError> {
        let client = Client::with_uri_str(uri).await?;
        let hosts = redact(uri);

        debug!(host = %hosts, database, "Pinging MongoDB");
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| ConnectorError::Unreachable {
                host: hosts.clone(),
                source,
            })?;

        info!(host = %hosts, database, "Connected to MongoDB");
        Ok(Self {
            database: client.database(database),
            client,
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }

    pub fn source(&self, collection: &str) -> MongoSource {
        MongoSource::new(self.collection(collection))
    }

    pub fn destination(&self, collection: &str) -> MongoDestination {
        MongoDestination::new(self.database.clone(), self.collection(collection))
    }

    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }
}

/// Strips credentials from a connection string before it is logged.
pub fn redact(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    let hosts = match rest.rsplit_once('@') {
        Some((_, hosts)) => hosts,
        None => rest,
    };
    let hosts = hosts.split(['/', '?']).next().unwrap_or(hosts);
    format!("{scheme}://{hosts}")
}
