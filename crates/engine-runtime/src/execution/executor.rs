use super::{
    factory::RepositoryFactory,
    report::{CollectionOutcome, TransitReport},
    reporter,
    transit::CollectionTransit,
};
use crate::error::TransitError;
use engine_config::settings::TransitSettings;
use engine_core::{progress::ProgressNotifier, retry::RetryPolicy};
use std::{collections::HashMap, sync::Arc, time::Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

pub async fn run(
    settings: TransitSettings,
    factory: Arc<dyn RepositoryFactory>,
    cancel: CancellationToken,
) -> Result<TransitReport, TransitError> {
    TransitExecutor::new(settings, factory, cancel).execute().await
}

/// Transfers every configured collection concurrently, once or in a loop.
pub struct TransitExecutor {
    settings: TransitSettings,
    factory: Arc<dyn RepositoryFactory>,
    cancel: CancellationToken,
    retry: RetryPolicy,
    notifiers: HashMap<String, ProgressNotifier>,
    started: chrono::DateTime<chrono::Utc>,
}

impl TransitExecutor {
    pub fn new(
        settings: TransitSettings,
        factory: Arc<dyn RepositoryFactory>,
        cancel: CancellationToken,
    ) -> Self {
        let notifiers = settings
            .collections
            .iter()
            .map(|c| (c.name.clone(), ProgressNotifier::new(&c.name)))
            .collect();

        Self {
            settings,
            factory,
            cancel,
            retry: RetryPolicy::for_database(),
            notifiers,
            started: chrono::Utc::now(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn progress(&self, collection: &str) -> Option<&ProgressNotifier> {
        self.notifiers.get(collection)
    }

    /// Runs cycles until done, or in loop mode until shutdown is requested between cycles.
    pub async fn execute(&self) -> Result<TransitReport, TransitError> {
        info!(
            collections = self.settings.collections.len(),
            dry_run = self.settings.dry_run,
            run_loop = self.settings.run_loop,
            "Starting transit"
        );

        let reporter_cancel = self.cancel.child_token();
        let reporter = reporter::spawn(
            self.notifiers.values().cloned().collect(),
            self.settings.progress_interval,
            reporter_cancel.clone(),
        );

        let result = self.run_cycles().await;

        reporter_cancel.cancel();
        if let Err(err) = reporter.await {
            warn!(error = %err, "Progress reporter stopped abnormally");
        }
        result
    }

    async fn run_cycles(&self) -> Result<TransitReport, TransitError> {
        let mut report = TransitReport::default();

        loop {
            report.cycles += 1;
            info!(cycle = report.cycles, "Starting cycle");
            self.run_cycle(report.cycles, &mut report).await?;

            if !self.settings.run_loop {
                break;
            }

            info!(
                delay_secs = self.settings.cycle_delay.as_secs(),
                "Waiting before next cycle"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Shutdown requested between cycles, stopping");
                    break;
                }
                _ = tokio::time::sleep(self.settings.cycle_delay) => {}
            }
        }

        info!(cycles = report.cycles, "Transit completed");
        Ok(report)
    }

    /// One cycle over all collections. A failed collection does not stop its siblings.
    async fn run_cycle(&self, cycle: u64, report: &mut TransitReport) -> Result<(), TransitError> {
        let mut tasks = JoinSet::new();

        for settings in &self.settings.collections {
            let Some(progress) = self.notifiers.get(&settings.name).cloned() else {
                continue;
            };
            let span = info_span!("collection", name = %settings.name, cycle);
            let transit = CollectionTransit::new(
                settings.clone(),
                self.factory.repositories(&settings.name),
                progress,
            )
            .with_dry_run(self.settings.dry_run)
            .with_retry(self.retry.clone())
            .with_run_id(self.make_run_id(cycle, &settings.name));
            let cancel = self.cancel.clone();

            tasks.spawn(
                async move {
                    let start = Instant::now();
                    let outcome = transit.run_cycle(&cancel).await;
                    (transit.name().to_string(), outcome, start.elapsed())
                }
                .instrument(span),
            );
        }

        let mut cancelled = false;
        while let Some(joined) = tasks.join_next().await {
            let (name, outcome, elapsed) = joined?;
            match outcome {
                Ok(outcome) => report.collection_mut(&name).record(outcome, elapsed),
                Err(err) if err.is_cancelled() => cancelled = true,
                Err(err) => report.collection_mut(&name).record(
                    CollectionOutcome::Failed {
                        error: err.to_string(),
                    },
                    elapsed,
                ),
            }
        }

        if cancelled {
            warn!(cycle, "Cycle interrupted by shutdown");
            return Err(TransitError::Cancelled);
        }
        Ok(())
    }

    fn make_run_id(&self, cycle: u64, collection: &str) -> String {
        let mut h = blake3::Hasher::new();
        h.update(self.started.to_rfc3339().as_bytes());
        h.update(b":");
        h.update(&cycle.to_le_bytes());
        h.update(b":");
        h.update(collection.as_bytes());
        format!("run-{}", &h.finalize().to_hex()[..16])
    }
}
