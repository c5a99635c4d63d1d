use crate::query::filter::SourceFilter;
use bson::DateTime;
use std::time::Duration;

/// Settings of an iterative (checkpoint based) transit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterativeOptions {
    /// Destination field whose maximum value is the checkpoint.
    pub field: String,
    /// Subtracted from the discovered checkpoint to cover clock skew and late writes.
    pub offset: Duration,
    /// Used as is instead of the discovered checkpoint.
    pub force_checkpoint: Option<DateTime>,
}

impl IterativeOptions {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            offset: Duration::ZERO,
            force_checkpoint: None,
        }
    }

    pub fn with_offset(mut self, offset: Duration) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_forced_checkpoint(mut self, checkpoint: DateTime) -> Self {
        self.force_checkpoint = Some(checkpoint);
        self
    }

    /// Applies the forced value or the offset to the checkpoint found in the destination.
    pub fn resolve_checkpoint(&self, found: Option<DateTime>) -> Option<DateTime> {
        if let Some(forced) = self.force_checkpoint {
            return Some(forced);
        }

        let offset_ms = i64::try_from(self.offset.as_millis()).unwrap_or(i64::MAX);
        found.map(|checkpoint| {
            DateTime::from_millis(checkpoint.timestamp_millis().saturating_sub(offset_ms))
        })
    }
}

/// What a transit cycle is about to stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPrepareResult {
    pub filter: SourceFilter,
    pub count: u64,
}

impl CollectionPrepareResult {
    pub fn new(filter: SourceFilter, count: u64) -> Self {
        Self { filter, count }
    }

    /// Nothing to transfer, the cycle is a no-op.
    pub fn is_noop(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_subtracted_from_found_checkpoint() {
        let options = IterativeOptions::new("Modified").with_offset(Duration::from_secs(60));
        let found = DateTime::from_millis(1_000_000);

        assert_eq!(
            options.resolve_checkpoint(Some(found)),
            Some(DateTime::from_millis(940_000))
        );
        assert_eq!(options.resolve_checkpoint(None), None);
    }

    #[test]
    fn forced_checkpoint_wins() {
        let forced = DateTime::from_millis(42);
        let options = IterativeOptions::new("Modified")
            .with_offset(Duration::from_secs(60))
            .with_forced_checkpoint(forced);

        assert_eq!(options.resolve_checkpoint(None), Some(forced));
        assert_eq!(
            options.resolve_checkpoint(Some(DateTime::from_millis(1_000_000))),
            Some(forced)
        );
    }
}
