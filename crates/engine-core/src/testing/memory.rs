use crate::{
    connectors::{
        destination::{DestinationRepository, KeyFinder},
        source::{DocumentPages, SourceRepository},
    },
    error::{BulkWriteFailure, RepositoryError, WriteError},
};
use async_trait::async_trait;
use bson::{Bson, DateTime, Document};
use futures::{StreamExt, stream};
use model::{
    query::key::{ID_FIELD, lookup_path},
    records::replace::ReplaceSpec,
};
use std::{
    cmp::Ordering as CmpOrdering,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

/// Decides whether writing a replacement document fails, and with which message.
pub type FailureRule = Arc<dyn Fn(&Document) -> Option<String> + Send + Sync>;

const INJECTED_FAILURE_CODE: i32 = 2;

#[derive(Default)]
struct Faults {
    bulk_items: Option<FailureRule>,
    bulk_request: Option<String>,
    single_writes: Option<FailureRule>,
    write_delay: Option<Duration>,
    transient_queries: u32,
}

#[derive(Default)]
struct Counters {
    bulk_calls: AtomicU64,
    single_calls: AtomicU64,
    mutations: AtomicU64,
    key_lookups: AtomicU64,
}

struct InnerCollection {
    documents: Mutex<Vec<Document>>,
    faults: Mutex<Faults>,
    counters: Counters,
}

/// A collection held in memory, usable as source and destination.
#[derive(Clone)]
pub struct MemoryCollection {
    name: Arc<str>,
    inner: Arc<InnerCollection>,
}

impl MemoryCollection {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            inner: Arc::new(InnerCollection {
                documents: Mutex::new(Vec::new()),
                faults: Mutex::new(Faults::default()),
                counters: Counters::default(),
            }),
        }
    }

    pub fn with_documents(self, documents: impl IntoIterator<Item = Document>) -> Self {
        self.docs().extend(documents);
        self
    }

    pub fn insert(&self, document: Document) {
        self.docs().push(document);
    }

    pub fn documents(&self) -> Vec<Document> {
        self.docs().clone()
    }

    pub fn len(&self) -> usize {
        self.docs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs().is_empty()
    }

    pub fn find_by_id(&self, id: &Bson) -> Option<Document> {
        self.docs()
            .iter()
            .find(|doc| doc.get(ID_FIELD) == Some(id))
            .cloned()
    }

    /// Items whose replacement matches `rule` fail inside bulk writes.
    pub fn fail_bulk_items(
        &self,
        rule: impl Fn(&Document) -> Option<String> + Send + Sync + 'static,
    ) {
        self.faults().bulk_items = Some(Arc::new(rule));
    }

    /// Every bulk write fails as a whole with `message`.
    pub fn fail_bulk_requests(&self, message: impl Into<String>) {
        self.faults().bulk_request = Some(message.into());
    }

    pub fn fail_single_writes(
        &self,
        rule: impl Fn(&Document) -> Option<String> + Send + Sync + 'static,
    ) {
        self.faults().single_writes = Some(Arc::new(rule));
    }

    pub fn delay_writes(&self, delay: Duration) {
        self.faults().write_delay = Some(delay);
    }

    /// The next `times` counts, deletes and checkpoint lookups fail with a transient error.
    pub fn fail_queries_transiently(&self, times: u32) {
        self.faults().transient_queries = times;
    }

    pub fn bulk_calls(&self) -> u64 {
        self.inner.counters.bulk_calls.load(Ordering::SeqCst)
    }

    pub fn single_calls(&self) -> u64 {
        self.inner.counters.single_calls.load(Ordering::SeqCst)
    }

    /// Documents inserted, replaced or deleted so far.
    pub fn mutations(&self) -> u64 {
        self.inner.counters.mutations.load(Ordering::SeqCst)
    }

    pub fn key_lookups(&self) -> u64 {
        self.inner.counters.key_lookups.load(Ordering::SeqCst)
    }

    fn docs(&self) -> MutexGuard<'_, Vec<Document>> {
        self.inner
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.inner
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn transient_fault(&self) -> Result<(), RepositoryError> {
        let mut faults = self.faults();
        if faults.transient_queries == 0 {
            return Ok(());
        }
        faults.transient_queries -= 1;
        Err(RepositoryError::Transient(format!(
            "connection to '{}' was reset",
            self.name
        )))
    }

    async fn write_latency(&self) {
        let delay = self.faults().write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn matching(&self, predicate: &Document) -> Vec<Document> {
        self.docs()
            .iter()
            .filter(|doc| matches(doc, predicate))
            .cloned()
            .collect()
    }

    fn apply_replace(&self, documents: &mut Vec<Document>, spec: &ReplaceSpec, upsert: bool) {
        match documents.iter().position(|doc| matches(doc, &spec.filter)) {
            Some(position) => {
                let mut replacement = spec.replacement.clone();
                if !replacement.contains_key(ID_FIELD)
                    && let Some(id) = documents[position].get(ID_FIELD)
                {
                    replacement.insert(ID_FIELD, id.clone());
                }
                documents[position] = replacement;
            }
            None if upsert => documents.push(spec.replacement.clone()),
            None => return,
        }
        self.inner.counters.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SourceRepository for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_pages(
        &self,
        predicate: Document,
        page_size: usize,
    ) -> Result<DocumentPages, RepositoryError> {
        let page_size = page_size.max(1);
        let pages: Vec<Vec<Document>> = self
            .matching(&predicate)
            .chunks(page_size)
            .map(<[Document]>::to_vec)
            .collect();

        Ok(stream::iter(pages.into_iter().map(Ok)).boxed())
    }

    async fn count(&self, predicate: Document) -> Result<u64, RepositoryError> {
        self.transient_fault()?;
        Ok(self.matching(&predicate).len() as u64)
    }

    async fn count_all(&self) -> Result<u64, RepositoryError> {
        self.transient_fault()?;
        Ok(self.len() as u64)
    }
}

#[async_trait]
impl KeyFinder for MemoryCollection {
    async fn find_by_key(&self, id: &Bson) -> Result<Option<Document>, RepositoryError> {
        self.inner.counters.key_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.find_by_id(id))
    }
}

#[async_trait]
impl DestinationRepository for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn bulk_replace(&self, batch: &[ReplaceSpec]) -> Result<(), WriteError> {
        self.write_latency().await;
        self.inner.counters.bulk_calls.fetch_add(1, Ordering::SeqCst);

        let (request_failure, item_rule) = {
            let faults = self.faults();
            (faults.bulk_request.clone(), faults.bulk_items.clone())
        };
        if let Some(message) = request_failure {
            return Err(WriteError::Other(RepositoryError::Write(message)));
        }

        let mut failures = Vec::new();
        let mut documents = self.docs();
        for (index, spec) in batch.iter().enumerate() {
            let failure = item_rule.as_ref().and_then(|rule| rule(&spec.replacement));
            if let Some(message) = failure {
                failures.push(BulkWriteFailure::new(index, INJECTED_FAILURE_CODE, message));
                continue;
            }
            self.apply_replace(&mut documents, spec, spec.upsert);
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(WriteError::Bulk { failures })
        }
    }

    async fn replace_one_upsert(&self, spec: &ReplaceSpec) -> Result<(), RepositoryError> {
        self.write_latency().await;
        self.inner.counters.single_calls.fetch_add(1, Ordering::SeqCst);

        let rule = self.faults().single_writes.clone();
        if let Some(message) = rule.and_then(|rule| rule(&spec.replacement)) {
            return Err(RepositoryError::Write(message));
        }

        let mut documents = self.docs();
        self.apply_replace(&mut documents, spec, true);
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64, RepositoryError> {
        self.transient_fault()?;
        let mut documents = self.docs();
        let deleted = documents.len() as u64;
        documents.clear();
        self.inner
            .counters
            .mutations
            .fetch_add(deleted, Ordering::SeqCst);
        Ok(deleted)
    }

    async fn find_last_checkpoint(
        &self,
        field: &str,
    ) -> Result<Option<DateTime>, RepositoryError> {
        self.transient_fault()?;
        let mut last: Option<DateTime> = None;
        for document in self.docs().iter() {
            match lookup_path(document, field) {
                Some(Bson::DateTime(value)) => {
                    last = Some(last.map_or(*value, |current| current.max(*value)));
                }
                None | Some(Bson::Null) => {}
                Some(other) => {
                    return Err(RepositoryError::InvalidCheckpoint {
                        field: field.to_string(),
                        value: other.to_string(),
                    });
                }
            }
        }
        Ok(last)
    }
}

/// Evaluates the predicate shapes produced by the pipeline: match-all, conjunctive
/// equality and the `$gte`/`$gt`/`$lte`/`$lt`/`$exists`/`$ne`/`$eq` operators.
fn matches(document: &Document, predicate: &Document) -> bool {
    predicate.iter().all(|(field, condition)| {
        let value = lookup_path(document, field);
        match condition {
            Bson::Document(operators) if is_operator_document(operators) => operators
                .iter()
                .all(|(operator, operand)| evaluate(operator, value, operand)),
            expected => value.unwrap_or(&Bson::Null) == expected,
        }
    })
}

fn is_operator_document(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

fn evaluate(operator: &str, value: Option<&Bson>, operand: &Bson) -> bool {
    let actual = value.unwrap_or(&Bson::Null);
    match operator {
        "$exists" => value.is_some() == matches!(operand, Bson::Boolean(true)),
        "$eq" => actual == operand,
        "$ne" => actual != operand,
        "$gte" => compare(actual, operand).is_some_and(CmpOrdering::is_ge),
        "$gt" => compare(actual, operand).is_some_and(CmpOrdering::is_gt),
        "$lte" => compare(actual, operand).is_some_and(CmpOrdering::is_le),
        "$lt" => compare(actual, operand).is_some_and(CmpOrdering::is_lt),
        _ => false,
    }
}

fn compare(left: &Bson, right: &Bson) -> Option<CmpOrdering> {
    match (left, right) {
        (Bson::DateTime(l), Bson::DateTime(r)) => Some(l.cmp(r)),
        (Bson::String(l), Bson::String(r)) => Some(l.cmp(r)),
        (l, r) => as_f64(l)?.partial_cmp(&as_f64(r)?),
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}
