use crate::error::TransitError;
use engine_core::{
    connectors::{destination::DestinationRepository, source::SourceRepository},
    error::RepositoryError,
    progress::{ProgressNotifier, TransitPhase},
    retry::{RetryDisposition, RetryPolicy},
};
use model::{
    execution::prepare::{CollectionPrepareResult, IterativeOptions},
    query::filter::SourceFilter,
};
use std::{future::Future, sync::Arc};
use tracing::{info, warn};

/// Decides the filter and document count of a transit cycle.
pub struct CollectionPreparation {
    collection: String,
    source: Arc<dyn SourceRepository>,
    destination: Arc<dyn DestinationRepository>,
    progress: ProgressNotifier,
    retry: RetryPolicy,
    dry_run: bool,
}

impl CollectionPreparation {
    pub fn new(
        collection: &str,
        source: Arc<dyn SourceRepository>,
        destination: Arc<dyn DestinationRepository>,
        progress: ProgressNotifier,
    ) -> Self {
        Self {
            collection: collection.to_string(),
            source,
            destination,
            progress,
            retry: RetryPolicy::for_database(),
            dry_run: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Full mode empties the destination and counts the whole source.
    /// Iterative mode counts the source documents at or past the checkpoint.
    pub async fn prepare(
        &self,
        iterative: Option<&IterativeOptions>,
    ) -> Result<CollectionPrepareResult, TransitError> {
        match iterative {
            Some(options) => self.count_lag(options).await,
            None => {
                self.remove_destination_documents().await?;
                self.count_all().await
            }
        }
    }

    /// Like [`CollectionPreparation::prepare`], without touching the destination.
    pub async fn lag(
        &self,
        iterative: Option<&IterativeOptions>,
    ) -> Result<CollectionPrepareResult, TransitError> {
        match iterative {
            Some(options) => self.count_lag(options).await,
            None => self.count_all().await,
        }
    }

    async fn remove_destination_documents(&self) -> Result<(), TransitError> {
        self.progress.set_phase(TransitPhase::RemovingDocuments);
        if self.dry_run {
            info!(collection = %self.collection, "Dry run, destination documents kept");
            return Ok(());
        }

        let deleted = self
            .retrying("delete_all", || self.destination.delete_all())
            .await?;
        info!(collection = %self.collection, deleted, "Destination documents removed");
        Ok(())
    }

    async fn count_all(&self) -> Result<CollectionPrepareResult, TransitError> {
        self.progress.set_phase(TransitPhase::CountingDocuments);
        let count = self
            .retrying("count_all", || self.source.count_all())
            .await?;

        info!(collection = %self.collection, count, "Source documents counted");
        Ok(CollectionPrepareResult::new(SourceFilter::empty(), count))
    }

    async fn count_lag(
        &self,
        options: &IterativeOptions,
    ) -> Result<CollectionPrepareResult, TransitError> {
        self.progress.set_phase(TransitPhase::SearchingCheckpoint);

        let found = match options.force_checkpoint {
            Some(_) => None,
            None => {
                self.retrying("find_last_checkpoint", || {
                    self.destination.find_last_checkpoint(&options.field)
                })
                .await?
            }
        };
        let checkpoint = options.resolve_checkpoint(found);
        if checkpoint.is_none() {
            warn!(
                collection = %self.collection,
                field = %options.field,
                "No checkpoint in destination, reading every document with the field"
            );
        }

        let filter = SourceFilter::iterative(options.field.clone(), checkpoint);
        self.progress.set_phase(TransitPhase::CountingDocuments);
        let count = self
            .retrying("count_lag", || self.source.count(filter.render()))
            .await?;

        info!(collection = %self.collection, filter = %filter, count, "Lag counted");
        Ok(CollectionPrepareResult::new(filter, count))
    }

    async fn retrying<T, F, Fut>(&self, operation: &str, op: F) -> Result<T, TransitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
    {
        self.retry
            .run_observed(op, classify_repository_error, |err, attempt, delay| {
                warn!(
                    collection = %self.collection,
                    operation,
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "Transient error, retrying"
                );
            })
            .await
            .map_err(|err| TransitError::Repository(err.into_inner()))
    }
}

fn classify_repository_error(err: &RepositoryError) -> RetryDisposition {
    if err.is_transient() {
        RetryDisposition::Retry
    } else {
        RetryDisposition::Stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{DateTime, doc};
    use engine_core::testing::MemoryCollection;
    use std::time::Duration;

    fn at(secs: i64) -> DateTime {
        DateTime::from_millis(secs * 1000)
    }

    fn preparation(
        source: &MemoryCollection,
        destination: &MemoryCollection,
    ) -> CollectionPreparation {
        CollectionPreparation::new(
            "orders",
            Arc::new(source.clone()),
            Arc::new(destination.clone()),
            ProgressNotifier::new("orders"),
        )
    }

    #[tokio::test]
    async fn full_mode_empties_destination_then_counts() {
        let source =
            MemoryCollection::new("orders").with_documents((0..5).map(|i| doc! { "_id": i }));
        let destination = MemoryCollection::new("orders").with_documents([doc! { "_id": 99 }]);

        let prepared = preparation(&source, &destination)
            .prepare(None)
            .await
            .unwrap();

        assert_eq!(prepared, CollectionPrepareResult::new(SourceFilter::empty(), 5));
        assert!(destination.is_empty());
    }

    #[tokio::test]
    async fn dry_run_keeps_destination_documents() {
        let source = MemoryCollection::new("orders");
        let destination = MemoryCollection::new("orders").with_documents([doc! { "_id": 1 }]);

        let prepared = preparation(&source, &destination)
            .with_dry_run(true)
            .prepare(None)
            .await
            .unwrap();

        assert!(prepared.is_noop());
        assert_eq!(destination.len(), 1);
    }

    #[tokio::test]
    async fn iterative_mode_counts_from_offset_checkpoint() {
        let source = MemoryCollection::new("orders").with_documents([
            doc! { "_id": 1, "Modified": at(100) },
            doc! { "_id": 2, "Modified": at(140) },
            doc! { "_id": 3, "Modified": at(200) },
        ]);
        let destination = MemoryCollection::new("orders")
            .with_documents([doc! { "_id": 1, "Modified": at(200) }]);
        let options = IterativeOptions::new("Modified").with_offset(Duration::from_secs(60));

        let prepared = preparation(&source, &destination)
            .prepare(Some(&options))
            .await
            .unwrap();

        assert_eq!(prepared.filter, SourceFilter::iterative("Modified", Some(at(140))));
        assert_eq!(prepared.count, 2);
        assert_eq!(destination.len(), 1);
    }

    #[tokio::test]
    async fn forced_checkpoint_wins() {
        let source = MemoryCollection::new("orders").with_documents([
            doc! { "_id": 1, "Modified": at(10) },
            doc! { "_id": 2, "Modified": at(20) },
        ]);
        let destination = MemoryCollection::new("orders")
            .with_documents([doc! { "_id": 1, "Modified": at(20) }]);
        let options = IterativeOptions::new("Modified").with_forced_checkpoint(at(0));

        let prepared = preparation(&source, &destination)
            .lag(Some(&options))
            .await
            .unwrap();
        assert_eq!(prepared.filter.checkpoint(), Some(at(0)));
        assert_eq!(prepared.count, 2);
    }

    #[tokio::test]
    async fn missing_checkpoint_reads_documents_with_the_field() {
        let source = MemoryCollection::new("orders").with_documents([
            doc! { "_id": 1, "Modified": at(10) },
            doc! { "_id": 2 },
            doc! { "_id": 3, "Modified": bson::Bson::Null },
        ]);
        let destination = MemoryCollection::new("orders");
        let options = IterativeOptions::new("Modified");

        let prepared = preparation(&source, &destination)
            .prepare(Some(&options))
            .await
            .unwrap();

        assert_eq!(prepared.filter, SourceFilter::iterative("Modified", None));
        assert_eq!(prepared.count, 1);
    }

    #[tokio::test]
    async fn transient_errors_are_retried_with_the_configured_policy() {
        let source = MemoryCollection::new("orders").with_documents([
            doc! { "_id": 1, "Modified": at(10) },
            doc! { "_id": 2, "Modified": at(20) },
        ]);
        let destination = MemoryCollection::new("orders")
            .with_documents([doc! { "_id": 1, "Modified": at(10) }]);
        destination.fail_queries_transiently(2);
        let options = IterativeOptions::new("Modified");

        let prepared = preparation(&source, &destination)
            .with_retry(RetryPolicy::new(3, Duration::ZERO, Duration::ZERO))
            .prepare(Some(&options))
            .await
            .unwrap();

        assert_eq!(prepared.filter.checkpoint(), Some(at(10)));
        assert_eq!(prepared.count, 2);
    }

    #[tokio::test]
    async fn transient_errors_past_the_attempt_limit_fail() {
        let source = MemoryCollection::new("orders");
        let destination = MemoryCollection::new("orders");
        source.fail_queries_transiently(2);

        let err = preparation(&source, &destination)
            .with_retry(RetryPolicy::new(2, Duration::ZERO, Duration::ZERO))
            .lag(None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransitError::Repository(RepositoryError::Transient(_))
        ));
    }

    #[tokio::test]
    async fn invalid_checkpoint_is_fatal() {
        let source = MemoryCollection::new("orders");
        let destination = MemoryCollection::new("orders")
            .with_documents([doc! { "_id": 1, "Modified": "yesterday" }]);
        let options = IterativeOptions::new("Modified");

        let err = preparation(&source, &destination)
            .prepare(Some(&options))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransitError::Repository(RepositoryError::InvalidCheckpoint { .. })
        ));
    }
}
