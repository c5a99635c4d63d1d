use engine_runtime::execution::report::TransitReport;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::{signal, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

const INTERRUPTED: u8 = 130;

/// How a `transit` invocation ended, mapped to the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// The run failed, or a collection failed its last cycle.
    Failed,
    /// SIGINT or SIGTERM stopped the run.
    Interrupted,
}

impl Outcome {
    pub fn of_run(report: &TransitReport, interrupted: bool) -> Self {
        if interrupted {
            Outcome::Interrupted
        } else if report.has_failures() {
            Outcome::Failed
        } else {
            Outcome::Completed
        }
    }
}

impl From<Outcome> for std::process::ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Completed => std::process::ExitCode::SUCCESS,
            Outcome::Failed => std::process::ExitCode::FAILURE,
            Outcome::Interrupted => std::process::ExitCode::from(INTERRUPTED),
        }
    }
}

/// Cancels a transit run on the first SIGINT or SIGTERM.
///
/// The first signal stops the executor and lets it report what was written. A second
/// signal exits the process at once, abandoning batches still in flight.
pub struct ShutdownSignal {
    received: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn listen(token: CancellationToken, collections: Vec<String>) -> Self {
        let received = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(name) = next_signal().await {
                if tx.send(name).is_err() {
                    break;
                }
            }
        });

        let flag = received.clone();
        tokio::spawn(async move {
            if let Some(second) = watch(rx, token, flag, collections).await {
                error!(signal = second, "Second signal received, exiting without cleanup");
                std::process::exit(i32::from(INTERRUPTED));
            }
        });

        Self { received }
    }

    pub fn received(&self) -> bool {
        self.received.load(Ordering::SeqCst)
    }
}

/// Cancels `token` on the first signal and returns the second one, if any arrives.
async fn watch(
    mut signals: mpsc::UnboundedReceiver<&'static str>,
    token: CancellationToken,
    received: Arc<AtomicBool>,
    collections: Vec<String>,
) -> Option<&'static str> {
    let first = signals.recv().await?;
    warn!(
        signal = first,
        collections = %collections.join(", "),
        "Stopping transit, send the signal again to exit immediately"
    );
    received.store(true, Ordering::SeqCst);
    token.cancel();

    signals.recv().await
}

#[cfg(unix)]
async fn next_signal() -> Option<&'static str> {
    use signal::unix::{SignalKind, signal as unix_signal};

    match unix_signal(SignalKind::terminate()) {
        Ok(mut terminate) => tokio::select! {
            interrupt = signal::ctrl_c() => interrupted(interrupt),
            _ = terminate.recv() => Some("SIGTERM"),
        },
        Err(err) => {
            warn!(error = %err, "Cannot listen for SIGTERM, only SIGINT stops the transit");
            interrupted(signal::ctrl_c().await)
        }
    }
}

#[cfg(not(unix))]
async fn next_signal() -> Option<&'static str> {
    interrupted(signal::ctrl_c().await)
}

fn interrupted(result: std::io::Result<()>) -> Option<&'static str> {
    match result {
        Ok(()) => Some("SIGINT"),
        Err(err) => {
            warn!(error = %err, "Cannot listen for SIGINT");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_runtime::execution::report::CollectionOutcome;
    use std::time::Duration;

    #[tokio::test]
    async fn first_signal_cancels_and_second_is_returned() {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let received = Arc::new(AtomicBool::new(false));
        let watcher = tokio::spawn(watch(
            rx,
            token.clone(),
            received.clone(),
            vec!["orders".to_string(), "customers".to_string()],
        ));

        tx.send("SIGTERM").unwrap();
        token.cancelled().await;
        assert!(received.load(Ordering::SeqCst));

        tx.send("SIGINT").unwrap();
        assert_eq!(watcher.await.unwrap(), Some("SIGINT"));
    }

    #[tokio::test]
    async fn closed_signal_source_leaves_the_run_alone() {
        let (tx, rx) = mpsc::unbounded_channel::<&'static str>();
        let token = CancellationToken::new();
        let received = Arc::new(AtomicBool::new(false));
        drop(tx);

        assert_eq!(watch(rx, token.clone(), received.clone(), Vec::new()).await, None);
        assert!(!token.is_cancelled());
        assert!(!received.load(Ordering::SeqCst));
    }

    #[test]
    fn interruption_wins_over_failures() {
        let mut report = TransitReport::default();
        assert_eq!(Outcome::of_run(&report, false), Outcome::Completed);

        report
            .collection_mut("orders")
            .record(CollectionOutcome::Failed { error: "boom".into() }, Duration::ZERO);
        assert_eq!(Outcome::of_run(&report, false), Outcome::Failed);
        assert_eq!(Outcome::of_run(&report, true), Outcome::Interrupted);
    }
}
