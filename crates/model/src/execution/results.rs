use serde::Serialize;
use std::ops::{Add, AddAssign};

/// Running totals of a single write worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerResult {
    pub successful: u64,
    /// Items forwarded to the retry tier.
    pub retryable: u64,
    /// Items that will never be retried.
    pub failed: u64,
}

impl WorkerResult {
    pub fn new(successful: u64, retryable: u64, failed: u64) -> Self {
        Self {
            successful,
            retryable,
            failed,
        }
    }

    pub fn total(&self) -> u64 {
        self.successful + self.retryable + self.failed
    }
}

impl Add for WorkerResult {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            successful: self.successful + rhs.successful,
            retryable: self.retryable + rhs.retryable,
            failed: self.failed + rhs.failed,
        }
    }
}

impl AddAssign for WorkerResult {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Running totals of a single retry worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryResult {
    pub successful: u64,
    pub failed: u64,
}

impl RetryResult {
    pub fn new(successful: u64, failed: u64) -> Self {
        Self { successful, failed }
    }
}

impl Add for RetryResult {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            successful: self.successful + rhs.successful,
            failed: self.failed + rhs.failed,
        }
    }
}

impl AddAssign for RetryResult {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Aggregate outcome of one transit.
///
/// `processed` counts successful writes across both tiers, `retried` counts items that
/// entered the retry tier whatever their outcome, `failed` counts items that are lost for
/// this run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferResults {
    pub processed: u64,
    pub retried: u64,
    pub failed: u64,
}

impl TransferResults {
    pub fn new(processed: u64, retried: u64, failed: u64) -> Self {
        Self {
            processed,
            retried,
            failed,
        }
    }

    pub fn from_tiers(written: WorkerResult, retried: RetryResult) -> Self {
        Self {
            processed: written.successful + retried.successful,
            retried: written.retryable,
            failed: written.failed + retried.failed,
        }
    }
}

impl AddAssign for TransferResults {
    fn add_assign(&mut self, rhs: Self) {
        self.processed += rhs.processed;
        self.retried += rhs.retried;
        self.failed += rhs.failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_results_sum_field_by_field() {
        let mut total = WorkerResult::default();
        total += WorkerResult::new(10, 2, 1);
        total += WorkerResult::new(5, 0, 3);

        assert_eq!(total, WorkerResult::new(15, 2, 4));
        assert_eq!(total.total(), 21);
    }

    #[test]
    fn transfer_results_combine_both_tiers() {
        let results =
            TransferResults::from_tiers(WorkerResult::new(90, 8, 2), RetryResult::new(6, 2));

        assert_eq!(results, TransferResults::new(96, 8, 4));
    }
}
