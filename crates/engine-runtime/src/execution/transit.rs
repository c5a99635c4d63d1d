use super::{factory::Repositories, prepare::CollectionPreparation, report::CollectionOutcome};
use crate::error::TransitError;
use engine_config::settings::CollectionSettings;
use engine_core::{
    progress::{ProgressNotifier, TransitPhase},
    retry::RetryPolicy,
};
use engine_processing::{
    channel,
    consumer::{DocumentsWriter, WriterConfig},
    producer::{DocumentReader, ReaderConfig},
};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Runs prepare, read and write for one collection.
pub struct CollectionTransit {
    settings: CollectionSettings,
    repositories: Repositories,
    progress: ProgressNotifier,
    retry: RetryPolicy,
    dry_run: bool,
    run_id: String,
}

impl CollectionTransit {
    pub fn new(
        settings: CollectionSettings,
        repositories: Repositories,
        progress: ProgressNotifier,
    ) -> Self {
        Self {
            settings,
            repositories,
            progress,
            retry: RetryPolicy::for_database(),
            dry_run: false,
            run_id: chrono::Utc::now().timestamp_millis().to_string(),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Runs one cycle. Failures are reported in the outcome, cancellation is an error.
    pub async fn run_cycle(
        &self,
        cancel: &CancellationToken,
    ) -> Result<CollectionOutcome, TransitError> {
        let start = Instant::now();
        let outcome = match self.transfer(cancel).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_cancelled() => {
                self.progress.set_phase(TransitPhase::Failed);
                return Err(err);
            }
            Err(err) => {
                error!(collection = %self.name(), error = %err, "Collection transit failed");
                self.progress.set_phase(TransitPhase::Failed);
                return Ok(CollectionOutcome::Failed {
                    error: err.to_string(),
                });
            }
        };

        self.progress.set_phase(TransitPhase::Completed);
        info!(
            collection = %self.name(),
            duration_ms = start.elapsed().as_millis(),
            "Collection cycle completed"
        );
        Ok(outcome)
    }

    async fn transfer(
        &self,
        cancel: &CancellationToken,
    ) -> Result<CollectionOutcome, TransitError> {
        let preparation = CollectionPreparation::new(
            &self.settings.name,
            self.repositories.source.clone(),
            self.repositories.destination.clone(),
            self.progress.clone(),
        )
        .with_retry(self.retry.clone())
        .with_dry_run(self.dry_run);

        let prepared = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransitError::Cancelled),
            prepared = preparation.prepare(self.settings.iterative.as_ref()) => prepared?,
        };

        if prepared.is_noop() {
            info!(collection = %self.name(), filter = %prepared.filter, "Nothing to transfer");
            return Ok(CollectionOutcome::UpToDate);
        }

        self.progress.start(prepared.count);
        self.progress.set_phase(TransitPhase::Transferring);
        info!(
            collection = %self.name(),
            expected = prepared.count,
            filter = %prepared.filter,
            "Starting transfer"
        );

        let (tx, rx) = channel::transit(self.settings.channel_capacity);
        let key_finder = self
            .settings
            .fetch_key_from_destination
            .then(|| self.repositories.key_finder.clone());

        let reader = DocumentReader::new(
            &self.settings.name,
            self.repositories.source.clone(),
            key_finder,
            ReaderConfig::default()
                .with_batch_size(self.settings.batch_size)
                .with_key_fields(self.settings.key_fields.clone())
                .with_upsert(self.settings.upsert),
            cancel.clone(),
        )
        .with_run_id(self.run_id.clone());

        let writer = DocumentsWriter::new(
            &self.settings.name,
            self.repositories.destination.clone(),
            rx,
            self.progress.clone(),
            WriterConfig::default()
                .with_workers(self.settings.workers)
                .with_retry_workers(self.settings.retry_workers)
                .with_dry_run(self.dry_run),
        );

        let (summary, results) = tokio::try_join!(
            async { reader.read(&prepared.filter, tx).await.map_err(TransitError::from) },
            async { writer.write(cancel.clone()).await.map_err(TransitError::from) },
        )?;

        info!(
            collection = %self.name(),
            read = summary.documents,
            batches = summary.batches,
            processed = results.processed,
            retried = results.retried,
            failed = results.failed,
            "Transfer finished"
        );

        Ok(CollectionOutcome::Transferred {
            expected: prepared.count,
            results,
        })
    }
}
