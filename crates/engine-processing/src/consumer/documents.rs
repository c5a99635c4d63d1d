use crate::{
    channel::{self, SharedReceiver},
    consumer::{
        components::{retry_writer::RetryWorker, writer::WriteWorker},
        config::WriterConfig,
    },
    error::ConsumerError,
};
use engine_core::{connectors::destination::DestinationRepository, progress::ProgressNotifier};
use model::{
    execution::results::{RetryResult, TransferResults, WorkerResult},
    records::batch::Batch,
};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span};

/// Drains the transit channel into the destination with a pool of bulk writers,
/// backed by a pool of single-document retry writers.
///
/// `write` consumes the writer, so a writer runs at most once.
pub struct DocumentsWriter {
    collection: String,
    destination: Arc<dyn DestinationRepository>,
    input: SharedReceiver<Batch>,
    progress: ProgressNotifier,
    config: WriterConfig,
}

impl DocumentsWriter {
    pub fn new(
        collection: &str,
        destination: Arc<dyn DestinationRepository>,
        input: SharedReceiver<Batch>,
        progress: ProgressNotifier,
        config: WriterConfig,
    ) -> Self {
        Self {
            collection: collection.to_string(),
            destination,
            input,
            progress,
            config,
        }
    }

    /// Runs both worker pools to completion and sums their results.
    ///
    /// The retry channel closes only after every write worker has returned, so no
    /// retryable item is lost. The first worker error aborts the rest.
    pub async fn write(self, cancel: CancellationToken) -> Result<TransferResults, ConsumerError> {
        let workers = self.config.workers.max(1);
        let retry_workers = self.config.retry_workers.max(1);
        let (retry_tx, retry_rx) = channel::retry();

        info!(
            collection = %self.collection,
            workers,
            retry_workers,
            dry_run = self.config.dry_run,
            "Starting document writers"
        );

        let mut retriers = JoinSet::new();
        for n in 1..=retry_workers {
            let name = format!("{}-Retry{n:02}", self.collection);
            let worker = RetryWorker::new(
                name.clone(),
                Arc::clone(&self.destination),
                retry_rx.clone(),
                self.progress.clone(),
                cancel.clone(),
            )
            .with_dry_run(self.config.dry_run);
            retriers.spawn(worker.run().instrument(info_span!("retry_worker", worker = %name)));
        }

        let mut writers = JoinSet::new();
        for n in 1..=workers {
            let name = format!("{}-{n:02}", self.collection);
            let worker = WriteWorker::new(
                name.clone(),
                Arc::clone(&self.destination),
                self.input.clone(),
                retry_tx.clone(),
                self.progress.clone(),
                cancel.clone(),
            )
            .with_dry_run(self.config.dry_run);
            writers.spawn(worker.run().instrument(info_span!("write_worker", worker = %name)));
        }

        let mut written = WorkerResult::default();
        while let Some(joined) = writers.join_next().await {
            written += joined??;
        }

        // Write workers are done producing retries.
        drop(retry_tx);

        let mut retried = RetryResult::default();
        while let Some(joined) = retriers.join_next().await {
            retried += joined??;
        }

        let results = TransferResults::from_tiers(written, retried);
        info!(
            collection = %self.collection,
            processed = results.processed,
            retried = results.retried,
            failed = results.failed,
            "Document writers finished"
        );
        Ok(results)
    }
}
