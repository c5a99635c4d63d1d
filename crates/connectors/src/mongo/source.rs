use super::error::query_error;
use async_trait::async_trait;
use bson::Document;
use engine_core::{
    connectors::source::{DocumentPages, SourceRepository},
    error::RepositoryError,
};
use futures_util::{StreamExt, TryStreamExt};
use mongodb::Collection;
use tracing::debug;

/// Reads one source collection.
#[derive(Clone)]
pub struct MongoSource {
    collection: Collection<Document>,
}

impl MongoSource {
    pub fn new(collection: Collection<Document>) -> Self {
        Self { collection }
    }
}

#[async_trait]
impl SourceRepository for MongoSource {
    fn name(&self) -> &str {
        self.collection.name()
    }

    async fn find_pages(
        &self,
        predicate: Document,
        page_size: usize,
    ) -> Result<DocumentPages, RepositoryError> {
        let page_size = page_size.max(1);
        debug!(collection = self.collection.name(), %predicate, page_size, "Opening cursor");

        let cursor = self
            .collection
            .find(predicate)
            .batch_size(u32::try_from(page_size).unwrap_or(u32::MAX))
            .await
            .map_err(query_error)?;

        Ok(cursor
            .try_chunks(page_size)
            .map_err(|chunk| query_error(chunk.1))
            .boxed())
    }

    async fn count(&self, predicate: Document) -> Result<u64, RepositoryError> {
        self.collection
            .count_documents(predicate)
            .await
            .map_err(query_error)
    }

    async fn count_all(&self) -> Result<u64, RepositoryError> {
        self.count(Document::new()).await
    }
}
