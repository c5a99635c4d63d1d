use crate::{
    channel,
    consumer::{DocumentsWriter, WriterConfig},
    producer::{DocumentReader, ReaderConfig},
};
use bson::{Document, doc};
use engine_core::{
    connectors::destination::DestinationRepository, progress::ProgressNotifier,
    testing::MemoryCollection,
};
use model::{
    execution::results::TransferResults, query::filter::SourceFilter, records::batch::Batch,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;


pub const RELOCATION: &str = concat!(
    "Document shard key value updates that cause the doc to move shards ",
    "must be sent with write batch of size 1"
);

pub fn documents(n: i32) -> Vec<Document> {
    (0..n).map(|i| doc! { "_id": i, "v": i }).collect()
}

pub fn batch_of(id: &str, documents: Vec<Document>) -> Batch {
    let items = documents
        .into_iter()
        .map(|d| {
            let filter = doc! { "_id": d.get("_id").cloned().unwrap_or(bson::Bson::Null) };
            model::records::replace::ReplaceSpec::new(filter, d, true)
        })
        .collect();
    Batch::new(id.to_string(), items)
}

/// Reads every source document and writes it to `destination` through the full pipeline.
pub async fn transit(
    source: &MemoryCollection,
    destination: &MemoryCollection,
    batch_size: usize,
    config: WriterConfig,
    progress: &ProgressNotifier,
) -> TransferResults {
    let cancel = CancellationToken::new();
    let (tx, rx) = channel::transit(config.workers);

    let reader = DocumentReader::new(
        "orders",
        Arc::new(source.clone()),
        None,
        ReaderConfig::default().with_batch_size(batch_size),
        cancel.clone(),
    );
    let dest: Arc<dyn DestinationRepository> = Arc::new(destination.clone());
    let writer = DocumentsWriter::new("orders", dest, rx, progress.clone(), config);

    let filter = SourceFilter::empty();
    let (_, results) = tokio::try_join!(
        async { reader.read(&filter, tx).await.map_err(|e| e.to_string()) },
        async { writer.write(cancel.clone()).await.map_err(|e| e.to_string()) },
    )
    .unwrap();
    results
}
