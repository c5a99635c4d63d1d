use crate::{channel::SharedReceiver, error::ConsumerError};
use engine_core::{connectors::destination::DestinationRepository, progress::ProgressNotifier};
use model::{execution::results::RetryResult, records::replace::ReplaceSpec};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Replays documents that a bulk write could not place, one upsert at a time.
///
/// Each item is attempted once; a failure here is final.
pub struct RetryWorker {
    name: String,
    destination: Arc<dyn DestinationRepository>,
    input: SharedReceiver<ReplaceSpec>,
    progress: ProgressNotifier,
    dry_run: bool,
    cancel: CancellationToken,
}

impl RetryWorker {
    pub fn new(
        name: String,
        destination: Arc<dyn DestinationRepository>,
        input: SharedReceiver<ReplaceSpec>,
        progress: ProgressNotifier,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            name,
            destination,
            input,
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

    /// Runs until the retry channel is closed and drained.
    pub async fn run(self) -> Result<RetryResult, ConsumerError> {
        let mut totals = RetryResult::default();

        loop {
            let spec = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ConsumerError::Cancelled),
                spec = self.input.recv() => spec,
            };
            let Some(spec) = spec else { break };

            let written = if self.dry_run {
                Ok(())
            } else {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(ConsumerError::Cancelled),
                    written = self.destination.replace_one_upsert(&spec) => written,
                }
            };

            match written {
                Ok(()) => {
                    totals.successful += 1;
                    self.progress.notify(1);
                }
                Err(err) => {
                    totals.failed += 1;
                    warn!(
                        worker = %self.name,
                        id = %spec.id_display(),
                        error = %err,
                        "Single document retry failed"
                    );
                }
            }
        }

        info!(
            worker = %self.name,
            successful = totals.successful,
            failed = totals.failed,
            "Retry worker finished"
        );
        Ok(totals)
    }
}
