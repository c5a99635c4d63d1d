use crate::error::RepositoryError;
use async_trait::async_trait;
use bson::Document;
use futures::stream::BoxStream;

/// Pages of raw documents read from one server-side cursor.
pub type DocumentPages = BoxStream<'static, Result<Vec<Document>, RepositoryError>>;

/// Query surface of the source collection.
#[async_trait]
pub trait SourceRepository: Send + Sync {
    fn name(&self) -> &str;

    /// Opens one cursor over the documents matching `predicate`.
    ///
    /// Every yielded page holds between 1 and `page_size` documents.
    async fn find_pages(
        &self,
        predicate: Document,
        page_size: usize,
    ) -> Result<DocumentPages, RepositoryError>;

    async fn count(&self, predicate: Document) -> Result<u64, RepositoryError>;

    async fn count_all(&self) -> Result<u64, RepositoryError>;
}
