use super::{
    bulk::{build_update_commands, chunk_failures, parse_write_errors, write_concern_error},
    error::{command_code, query_error, write_error},
};
use async_trait::async_trait;
use bson::{Bson, DateTime, Document, doc};
use engine_core::{
    connectors::destination::{DestinationRepository, KeyFinder},
    error::{RepositoryError, WriteError},
};
use model::{
    query::key::{ID_FIELD, lookup_path},
    records::replace::ReplaceSpec,
};
use mongodb::{Collection, Database};
use tracing::{debug, warn};

/// Writes to one destination collection.
#[derive(Clone)]
pub struct MongoDestination {
    database: Database,
    collection: Collection<Document>,
}

impl MongoDestination {
    pub fn new(database: Database, collection: Collection<Document>) -> Self {
        Self {
            database,
            collection,
        }
    }
}

#[async_trait]
impl KeyFinder for MongoDestination {
    async fn find_by_key(&self, id: &Bson) -> Result<Option<Document>, RepositoryError> {
        let mut filter = Document::new();
        filter.insert(ID_FIELD, id.clone());
        self.collection
            .find_one(filter)
            .await
            .map_err(query_error)
    }
}

#[async_trait]
impl DestinationRepository for MongoDestination {
    fn name(&self) -> &str {
        self.collection.name()
    }

    async fn bulk_replace(&self, batch: &[ReplaceSpec]) -> Result<(), WriteError> {
        if batch.is_empty() {
            return Ok(());
        }

        let name = self.collection.name();
        let chunks = build_update_commands(name, batch);
        let total = chunks.len();
        let mut failures = Vec::new();
        let mut rejected = Vec::new();

        for chunk in chunks {
            match self.database.run_command(chunk.command).await {
                Ok(reply) => {
                    if let Some(message) = write_concern_error(&reply) {
                        warn!(collection = name, error = %message, "Write concern not satisfied");
                    }
                    failures.extend(parse_write_errors(&reply, chunk.range.start));
                }
                Err(err) => {
                    let code = command_code(&err);
                    let err = write_error(err);
                    warn!(
                        collection = name,
                        items = chunk.range.len(),
                        error = %err,
                        "Bulk replace chunk rejected"
                    );
                    failures.extend(chunk_failures(chunk.range, code, &err.to_string()));
                    rejected.push(err);
                }
            }
        }

        if rejected.len() == total
            && let Some(err) = rejected.into_iter().next()
        {
            return Err(WriteError::Other(err));
        }

        debug!(
            collection = name,
            items = batch.len(),
            chunks = total,
            failures = failures.len(),
            "Bulk replace acknowledged"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(WriteError::Bulk { failures })
        }
    }

    async fn replace_one_upsert(&self, spec: &ReplaceSpec) -> Result<(), RepositoryError> {
        self.collection
            .replace_one(spec.filter.clone(), &spec.replacement)
            .upsert(true)
            .bypass_document_validation(true)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let result = self
            .collection
            .delete_many(Document::new())
            .await
            .map_err(write_error)?;
        Ok(result.deleted_count)
    }

    async fn find_last_checkpoint(
        &self,
        field: &str,
    ) -> Result<Option<DateTime>, RepositoryError> {
        let mut filter = Document::new();
        filter.insert(field, doc! { "$exists": true, "$ne": Bson::Null });
        let mut sort = Document::new();
        sort.insert(field, -1);
        let mut projection = Document::new();
        projection.insert(field, 1);

        let found = self
            .collection
            .find_one(filter)
            .sort(sort)
            .projection(projection)
            .await
            .map_err(query_error)?;

        let Some(document) = found else {
            return Ok(None);
        };

        match lookup_path(&document, field) {
            Some(Bson::DateTime(value)) => Ok(Some(*value)),
            Some(other) => Err(RepositoryError::InvalidCheckpoint {
                field: field.to_string(),
                value: other.to_string(),
            }),
            None => Ok(None),
        }
    }
}
