use serde::Serialize;
use std::{
    fmt,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU8, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

/// Phase of a collection transit, shown by the progress reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransitPhase {
    Idle,
    RemovingDocuments,
    CountingDocuments,
    SearchingCheckpoint,
    Transferring,
    Completed,
    Failed,
}

impl TransitPhase {
    const ALL: [TransitPhase; 7] = [
        TransitPhase::Idle,
        TransitPhase::RemovingDocuments,
        TransitPhase::CountingDocuments,
        TransitPhase::SearchingCheckpoint,
        TransitPhase::Transferring,
        TransitPhase::Completed,
        TransitPhase::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransitPhase::Idle => "Idle",
            TransitPhase::RemovingDocuments => "Removing documents",
            TransitPhase::CountingDocuments => "Counting documents",
            TransitPhase::SearchingCheckpoint => "Searching checkpoint",
            TransitPhase::Transferring => "Transferring",
            TransitPhase::Completed => "Completed",
            TransitPhase::Failed => "Failed",
        }
    }

    fn from_u8(value: u8) -> Self {
        Self::ALL
            .get(value as usize)
            .copied()
            .unwrap_or(TransitPhase::Idle)
    }

    fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for TransitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct InnerProgress {
    processed: AtomicU64,
    total: AtomicU64,
    phase: AtomicU8,
    started: Mutex<Instant>,
}

/// Shared progress of one collection.
///
/// Workers call [`ProgressNotifier::notify`] concurrently; the reporter reads snapshots.
#[derive(Debug, Clone)]
pub struct ProgressNotifier {
    collection: Arc<str>,
    inner: Arc<InnerProgress>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub collection: String,
    pub phase: TransitPhase,
    pub processed: u64,
    pub total: u64,
    pub elapsed: Duration,
}

impl ProgressNotifier {
    pub fn new(collection: &str) -> Self {
        ProgressNotifier {
            collection: Arc::from(collection),
            inner: Arc::new(InnerProgress {
                processed: AtomicU64::new(0),
                total: AtomicU64::new(0),
                phase: AtomicU8::new(TransitPhase::Idle.as_u8()),
                started: Mutex::new(Instant::now()),
            }),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Adds `count` documents to the processed counter.
    pub fn notify(&self, count: u64) {
        self.inner.processed.fetch_add(count, Ordering::Relaxed);
    }

    /// Resets the counters for a new cycle expecting `total` documents.
    pub fn start(&self, total: u64) {
        self.inner.processed.store(0, Ordering::Relaxed);
        self.inner.total.store(total, Ordering::Relaxed);
        *self
            .inner
            .started
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn set_phase(&self, phase: TransitPhase) {
        self.inner.phase.store(phase.as_u8(), Ordering::Relaxed);
    }

    pub fn phase(&self) -> TransitPhase {
        TransitPhase::from_u8(self.inner.phase.load(Ordering::Relaxed))
    }

    pub fn processed(&self) -> u64 {
        self.inner.processed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let started = *self
            .inner
            .started
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        ProgressSnapshot {
            collection: self.collection.to_string(),
            phase: self.phase(),
            processed: self.processed(),
            total: self.inner.total.load(Ordering::Relaxed),
            elapsed: started.elapsed(),
        }
    }
}

impl ProgressSnapshot {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.processed as f64 * 100.0 / self.total as f64
    }

    /// Documents per second since the cycle started.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= f64::EPSILON {
            return 0.0;
        }
        self.processed as f64 / secs
    }

    pub fn eta(&self) -> Option<Duration> {
        let rate = self.rate();
        if rate <= 0.0 || self.processed >= self.total {
            return None;
        }
        let remaining = (self.total - self.processed) as f64;
        Some(Duration::from_secs_f64(remaining / rate))
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.collection, self.phase)?;
        if self.phase != TransitPhase::Transferring {
            return Ok(());
        }

        write!(
            f,
            " {}/{} ({:.1}%), {:.0} docs/s",
            self.processed,
            self.total,
            self.percent(),
            self.rate()
        )?;
        match self.eta() {
            Some(eta) => write!(f, ", ETA {}s", eta.as_secs()),
            None => Ok(()),
        }
    }
}
