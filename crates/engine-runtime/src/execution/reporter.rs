use engine_core::progress::{ProgressNotifier, TransitPhase};
use std::time::Duration;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Periodically logs the progress of every busy collection until `cancel` fires.
pub fn spawn(
    notifiers: Vec<ProgressNotifier>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(100)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => report(&notifiers),
            }
        }
    })
}

fn report(notifiers: &[ProgressNotifier]) {
    for snapshot in notifiers.iter().map(ProgressNotifier::snapshot) {
        if matches!(snapshot.phase, TransitPhase::Idle | TransitPhase::Completed) {
            continue;
        }

        info!(
            collection = %snapshot.collection,
            phase = %snapshot.phase,
            processed = snapshot.processed,
            total = snapshot.total,
            percent = %format!("{:.1}", snapshot.percent()),
            rate = %format!("{:.0}", snapshot.rate()),
            eta_secs = snapshot.eta().map(|eta| eta.as_secs()),
            "{snapshot}"
        );
    }
}
