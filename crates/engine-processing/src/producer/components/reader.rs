use super::transformer::ReplaceTransformer;
use crate::{error::ProducerError, producer::config::ReaderConfig};
use engine_core::connectors::{destination::KeyFinder, source::SourceRepository};
use futures::StreamExt;
use model::{query::filter::SourceFilter, records::batch::Batch};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// What a completed read produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSummary {
    pub batches: u64,
    pub documents: u64,
}

/// Streams source documents into replace batches.
pub struct DocumentReader {
    collection: String,
    run_id: String,
    source: Arc<dyn SourceRepository>,
    transformer: ReplaceTransformer,
    config: ReaderConfig,
    cancel: CancellationToken,
}

impl DocumentReader {
    pub fn new(
        collection: &str,
        source: Arc<dyn SourceRepository>,
        key_finder: Option<Arc<dyn KeyFinder>>,
        config: ReaderConfig,
        cancel: CancellationToken,
    ) -> Self {
        let transformer =
            ReplaceTransformer::new(config.key_fields.clone(), config.upsert, key_finder);

        Self {
            collection: collection.to_string(),
            run_id: chrono::Utc::now().timestamp_millis().to_string(),
            source,
            transformer,
            config,
            cancel,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Reads every document matching `filter` and sends it to `output` in batches.
    ///
    /// `output` is owned by this call, so the channel closes on every exit path once the
    /// sender drops, including errors and cancellation.
    pub async fn read(
        &self,
        filter: &SourceFilter,
        output: mpsc::Sender<Batch>,
    ) -> Result<ReadSummary, ProducerError> {
        let batch_size = self.config.batch_size.max(1);
        info!(
            collection = %self.collection,
            filter = %filter,
            batch_size,
            "Opening source cursor"
        );

        let mut pages = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ProducerError::Cancelled),
            opened = self.source.find_pages(filter.render(), batch_size) => {
                opened.map_err(|source| self.read_error(source))?
            }
        };

        let mut summary = ReadSummary::default();
        loop {
            let page = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ProducerError::Cancelled),
                page = pages.next() => page,
            };
            let Some(page) = page else { break };
            let mut documents = page.map_err(|source| self.read_error(source))?;

            // Pages larger than a batch are split rather than trusted.
            while !documents.is_empty() {
                let rest = documents.split_off(documents.len().min(batch_size));
                let batch = self.build_batch(documents, summary.batches).await?;
                summary.documents += batch.len() as u64;
                summary.batches += 1;

                debug!(
                    collection = %self.collection,
                    batch_id = %batch.id,
                    rows = batch.len(),
                    "Sending batch to write workers"
                );

                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(ProducerError::Cancelled),
                    sent = output.send(batch) => sent.map_err(|_| ProducerError::ChannelClosed)?,
                }

                documents = rest;
            }
        }

        info!(
            collection = %self.collection,
            batches = summary.batches,
            documents = summary.documents,
            "Source cursor exhausted"
        );
        Ok(summary)
    }

    async fn build_batch(
        &self,
        documents: Vec<bson::Document>,
        seq: u64,
    ) -> Result<Batch, ProducerError> {
        let items = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ProducerError::Cancelled),
            items = self.transformer.transform_all(documents) => items?,
        };
        Ok(Batch::new(self.make_batch_id(seq), items))
    }

    fn make_batch_id(&self, seq: u64) -> String {
        let mut h = blake3::Hasher::new();
        h.update(self.run_id.as_bytes());
        h.update(self.collection.as_bytes());
        h.update(&seq.to_le_bytes());
        h.finalize().to_hex().to_string()
    }

    fn read_error(&self, source: engine_core::error::RepositoryError) -> ProducerError {
        ProducerError::Read {
            collection: self.collection.clone(),
            source,
        }
    }
}
