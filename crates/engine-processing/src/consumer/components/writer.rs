use crate::{
    channel::SharedReceiver,
    error::ConsumerError,
    retry::classify_bulk_failure,
};
use engine_core::{
    connectors::destination::DestinationRepository,
    error::{BulkWriteFailure, WriteError},
    progress::ProgressNotifier,
    retry::RetryDisposition,
};
use model::{
    execution::results::WorkerResult,
    records::{batch::Batch, replace::ReplaceSpec},
};
use std::{sync::Arc, time::Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Classified result of one bulk write.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub result: WorkerResult,
    /// Items to replay one by one.
    pub retry: Vec<ReplaceSpec>,
}

impl BatchOutcome {
    pub fn written(size: u64) -> Self {
        Self {
            result: WorkerResult::new(size, 0, 0),
            retry: Vec::new(),
        }
    }
}

/// Splits a partially failed batch into written, retryable and failed items.
///
/// Items not named by a failure were written. Relocation failures are handed back for
/// the retry tier, every other failure is terminal and logged with the document id.
pub fn classify_failures(items: Vec<ReplaceSpec>, failures: &[BulkWriteFailure]) -> BatchOutcome {
    let size = items.len() as u64;
    let mut slots: Vec<Option<ReplaceSpec>> = items.into_iter().map(Some).collect();
    let mut outcome = BatchOutcome::default();

    for failure in failures {
        let Some(spec) = slots.get_mut(failure.index).and_then(Option::take) else {
            warn!(
                index = failure.index,
                code = failure.code,
                "Bulk write failure does not match a batch item"
            );
            continue;
        };

        match classify_bulk_failure(failure) {
            RetryDisposition::Retry => {
                outcome.result.retryable += 1;
                outcome.retry.push(spec);
            }
            RetryDisposition::Stop => {
                outcome.result.failed += 1;
                warn!(
                    id = %spec.id_display(),
                    code = failure.code,
                    error = %failure.message,
                    "Document write failed"
                );
            }
        }
    }

    outcome.result.successful = size - outcome.result.retryable - outcome.result.failed;
    outcome
}

/// Takes batches off the transit channel and bulk writes them.
pub struct WriteWorker {
    name: String,
    destination: Arc<dyn DestinationRepository>,
    input: SharedReceiver<Batch>,
    retry_tx: mpsc::UnboundedSender<ReplaceSpec>,
    progress: ProgressNotifier,
    dry_run: bool,
    cancel: CancellationToken,
}

impl WriteWorker {
    pub fn new(
        name: String,
        destination: Arc<dyn DestinationRepository>,
        input: SharedReceiver<Batch>,
        retry_tx: mpsc::UnboundedSender<ReplaceSpec>,
        progress: ProgressNotifier,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            name,
            destination,
            input,
            retry_tx,
            progress,
            dry_run: false,
            cancel,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs until the channel is closed and drained.
    pub async fn run(self) -> Result<WorkerResult, ConsumerError> {
        let mut totals = WorkerResult::default();

        loop {
            let batch = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ConsumerError::Cancelled),
                batch = self.input.recv() => batch,
            };
            let Some(batch) = batch else { break };
            totals += self.process(batch).await?;
        }

        info!(
            worker = %self.name,
            successful = totals.successful,
            retryable = totals.retryable,
            failed = totals.failed,
            "Write worker finished"
        );
        Ok(totals)
    }

    async fn process(&self, batch: Batch) -> Result<WorkerResult, ConsumerError> {
        let start = Instant::now();
        let size = batch.len() as u64;

        let written = if self.dry_run {
            Ok(())
        } else {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ConsumerError::Cancelled),
                written = self.destination.bulk_replace(&batch.items) => written,
            }
        };

        let outcome = match written {
            Ok(()) => BatchOutcome::written(size),
            Err(WriteError::Bulk { failures }) => classify_failures(batch.items, &failures),
            Err(WriteError::Other(err)) => {
                error!(
                    worker = %self.name,
                    batch_id = %batch.id,
                    rows = size,
                    error = %err,
                    "Bulk write failed without item details, counting batch as failed"
                );
                return Ok(WorkerResult::new(0, 0, size));
            }
        };

        for spec in outcome.retry {
            self.retry_tx
                .send(spec)
                .map_err(|rejected| ConsumerError::RetryChannelClosed {
                    id: rejected.0.id_display(),
                })?;
        }

        self.progress.notify(outcome.result.successful);

        debug!(
            worker = %self.name,
            batch_id = %batch.id,
            rows = size,
            successful = outcome.result.successful,
            retryable = outcome.result.retryable,
            failed = outcome.result.failed,
            duration_ms = start.elapsed().as_millis(),
            "Batch written"
        );

        Ok(outcome.result)
    }
}
