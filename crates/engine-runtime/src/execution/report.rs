use model::execution::results::TransferResults;
use serde::Serialize;
use std::{collections::BTreeMap, time::Duration};

/// Result of one collection cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CollectionOutcome {
    /// Nothing matched the filter, no writer was started.
    UpToDate,
    Transferred { expected: u64, results: TransferResults },
    Failed { error: String },
}

/// Everything a run did for one collection, across cycles.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionReport {
    pub cycles: u64,
    pub failures: u64,
    pub totals: TransferResults,
    pub last: Option<CollectionOutcome>,
    #[serde(with = "duration_secs")]
    pub busy: Duration,
}

impl CollectionReport {
    pub fn record(&mut self, outcome: CollectionOutcome, elapsed: Duration) {
        self.cycles += 1;
        self.busy += elapsed;
        match &outcome {
            CollectionOutcome::Transferred { results, .. } => self.totals += *results,
            CollectionOutcome::Failed { .. } => self.failures += 1,
            CollectionOutcome::UpToDate => {}
        }
        self.last = Some(outcome);
    }
}

/// Summary of a transit run, keyed by collection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransitReport {
    pub cycles: u64,
    pub collections: BTreeMap<String, CollectionReport>,
}

impl TransitReport {
    pub fn collection_mut(&mut self, name: &str) -> &mut CollectionReport {
        self.collections.entry(name.to_string()).or_default()
    }

    /// Whether the last cycle of any collection failed.
    pub fn has_failures(&self) -> bool {
        self.collections
            .values()
            .any(|c| matches!(c.last, Some(CollectionOutcome::Failed { .. })))
    }

    pub fn totals(&self) -> TransferResults {
        let mut totals = TransferResults::default();
        for report in self.collections.values() {
            totals += report.totals;
        }
        totals
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}
