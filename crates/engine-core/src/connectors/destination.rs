use crate::error::{RepositoryError, WriteError};
use async_trait::async_trait;
use bson::{Bson, DateTime, Document};
use model::records::replace::ReplaceSpec;

/// Looks up the destination copy of a document by `_id`.
///
/// The reader only needs this capability, not the whole destination surface.
#[async_trait]
pub trait KeyFinder: Send + Sync {
    async fn find_by_key(&self, id: &Bson) -> Result<Option<Document>, RepositoryError>;
}

/// Write surface of the destination collection.
#[async_trait]
pub trait DestinationRepository: Send + Sync {
    fn name(&self) -> &str;

    /// Unordered bulk replace that bypasses document validation.
    ///
    /// Returns `WriteError::Bulk` listing the failed items when only some items fail.
    async fn bulk_replace(&self, batch: &[ReplaceSpec]) -> Result<(), WriteError>;

    /// Single-document replace with upsert, bypassing document validation.
    async fn replace_one_upsert(&self, spec: &ReplaceSpec) -> Result<(), RepositoryError>;

    /// Removes every document, returning how many were deleted.
    async fn delete_all(&self) -> Result<u64, RepositoryError>;

    /// Maximum value of `field` over the documents where it exists and is not null.
    async fn find_last_checkpoint(&self, field: &str) -> Result<Option<DateTime>, RepositoryError>;
}
