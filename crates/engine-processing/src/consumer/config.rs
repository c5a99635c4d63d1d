/// Configuration for the write and retry worker pools.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Concurrent bulk writers
    pub workers: usize,

    /// Concurrent single-document writers for relocated documents
    pub retry_workers: usize,

    /// Count batches as written without touching the destination
    pub dry_run: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            retry_workers: 2,
            dry_run: false,
        }
    }
}

impl WriterConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_retry_workers(mut self, workers: usize) -> Self {
        self.retry_workers = workers.max(1);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
