use bson::{Bson, Document, doc};
use engine_core::error::BulkWriteFailure;
use model::records::replace::ReplaceSpec;
use std::ops::Range;

/// Largest BSON document the server accepts as a command body.
pub const MAX_COMMAND_BYTES: usize = 16 * 1024 * 1024;

/// Largest number of statements the server accepts in one write command.
pub const MAX_WRITE_BATCH_SIZE: usize = 100_000;

/// Reserved for the command envelope around the `updates` array.
const COMMAND_ENVELOPE_BYTES: usize = 16 * 1024;

/// Element type, array index key and terminator of one `updates` entry.
const ENTRY_OVERHEAD_BYTES: usize = 8;

/// One `update` command covering `range` of the submitted batch.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateChunk {
    pub range: Range<usize>,
    pub command: Document,
}

/// Builds unordered `update` commands that replace every item of the batch.
///
/// Sending the command directly keeps per-item errors (`writeErrors`) available on every
/// server version and lets document validation be bypassed for the whole batch. The batch
/// is split so that no command exceeds the server's BSON size or write batch limits.
pub fn build_update_commands(collection: &str, batch: &[ReplaceSpec]) -> Vec<UpdateChunk> {
    let statements: Vec<Document> = batch.iter().map(update_statement).collect();
    let sizes: Vec<usize> = statements.iter().map(statement_size).collect();
    let ranges = plan_chunks(
        &sizes,
        MAX_COMMAND_BYTES - COMMAND_ENVELOPE_BYTES,
        MAX_WRITE_BATCH_SIZE,
    );

    let mut statements = statements.into_iter();
    ranges
        .into_iter()
        .map(|range| {
            let updates: Vec<Bson> = statements
                .by_ref()
                .take(range.len())
                .map(Bson::Document)
                .collect();
            UpdateChunk {
                range,
                command: update_command(collection, updates),
            }
        })
        .collect()
}

/// Splits consecutive statements into ranges under `max_bytes` and `max_count`.
/// A statement larger than `max_bytes` is sent alone and left for the server to reject.
pub fn plan_chunks(sizes: &[usize], max_bytes: usize, max_count: usize) -> Vec<Range<usize>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut bytes = 0;

    for (index, size) in sizes.iter().enumerate() {
        let size = size + ENTRY_OVERHEAD_BYTES;
        let count = index - start;
        if count > 0 && (count >= max_count || bytes + size > max_bytes) {
            chunks.push(start..index);
            start = index;
            bytes = 0;
        }
        bytes += size;
    }

    if start < sizes.len() {
        chunks.push(start..sizes.len());
    }
    chunks
}

fn update_statement(spec: &ReplaceSpec) -> Document {
    doc! {
        "q": spec.filter.clone(),
        "u": spec.replacement.clone(),
        "upsert": spec.upsert,
        "multi": false,
    }
}

fn statement_size(statement: &Document) -> usize {
    bson::to_vec(statement).map_or(0, |bytes| bytes.len())
}

fn update_command(collection: &str, updates: Vec<Bson>) -> Document {
    doc! {
        "update": collection,
        "updates": updates,
        "ordered": false,
        "bypassDocumentValidation": true,
    }
}

/// Extracts `writeErrors` from an `update` command reply, shifting indices by `offset`
/// so they point into the submitted batch rather than the chunk.
///
/// Entries without an index are dropped since they cannot be tied to an item.
pub fn parse_write_errors(reply: &Document, offset: usize) -> Vec<BulkWriteFailure> {
    let Ok(errors) = reply.get_array("writeErrors") else {
        return Vec::new();
    };

    errors
        .iter()
        .filter_map(Bson::as_document)
        .filter_map(|entry| {
            let index = as_i64(entry.get("index")?)?;
            let code = entry.get("code").and_then(as_i64).unwrap_or_default();
            let message = entry.get_str("errmsg").unwrap_or_default();
            Some(BulkWriteFailure::new(
                offset + usize::try_from(index).ok()?,
                i32::try_from(code).unwrap_or_default(),
                message,
            ))
        })
        .collect()
}

/// Marks every item of a rejected chunk as failed.
pub fn chunk_failures(range: Range<usize>, code: i32, message: &str) -> Vec<BulkWriteFailure> {
    range
        .map(|index| BulkWriteFailure::new(index, code, message))
        .collect()
}

/// Message of a `writeConcernError`, if the reply carries one.
pub fn write_concern_error(reply: &Document) -> Option<String> {
    reply.get_document("writeConcernError").ok().map(|err| {
        err.get_str("errmsg")
            .unwrap_or("unknown write concern error")
            .to_string()
    })
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) => Some(*v as i64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_is_unordered_and_bypasses_validation() {
        let batch = vec![
            ReplaceSpec::new(doc! { "_id": 1 }, doc! { "_id": 1, "v": "a" }, true),
            ReplaceSpec::new(doc! { "sku": "X" }, doc! { "_id": 2, "sku": "X" }, false),
        ];
        let chunks = build_update_commands("orders", &batch);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].range, 0..2);

        let command = &chunks[0].command;
        assert_eq!(command.get_str("update").unwrap(), "orders");
        assert!(!command.get_bool("ordered").unwrap());
        assert!(command.get_bool("bypassDocumentValidation").unwrap());

        let updates = command.get_array("updates").unwrap();
        assert_eq!(
            updates[1],
            Bson::Document(doc! {
                "q": { "sku": "X" },
                "u": { "_id": 2, "sku": "X" },
                "upsert": false,
                "multi": false,
            })
        );
    }

    #[test]
    fn large_batches_are_split_under_the_size_limit() {
        let payload = "x".repeat(1024 * 1024);
        let batch: Vec<ReplaceSpec> = (0..40)
            .map(|i| {
                let replacement = doc! { "_id": i, "blob": payload.as_str() };
                ReplaceSpec::new(doc! { "_id": i }, replacement, true)
            })
            .collect();

        let chunks = build_update_commands("orders", &batch);
        assert!(chunks.len() >= 3, "got {} chunks", chunks.len());

        let mut next = 0;
        for chunk in &chunks {
            assert_eq!(chunk.range.start, next);
            next = chunk.range.end;

            assert!(statement_size(&chunk.command) <= MAX_COMMAND_BYTES);
            let updates = chunk.command.get_array("updates").unwrap();
            assert_eq!(updates.len(), chunk.range.len());
            let first = updates[0].as_document().unwrap();
            let id = first.get_document("q").unwrap().get_i32("_id").unwrap();
            assert_eq!(id as usize, chunk.range.start);
        }
        assert_eq!(next, batch.len());
    }

    #[test]
    fn chunks_respect_byte_and_count_limits() {
        assert_eq!(plan_chunks(&[10, 10, 10, 10], 40, 100), vec![0..2, 2..4]);
        assert_eq!(plan_chunks(&[1; 5], 1000, 2), vec![0..2, 2..4, 4..5]);
        assert!(plan_chunks(&[], 40, 100).is_empty());
    }

    #[test]
    fn oversized_statement_is_sent_alone() {
        assert_eq!(plan_chunks(&[10, 500, 10], 100, 100), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn write_errors_are_parsed() {
        let reply = doc! {
            "n": 1,
            "nModified": 1,
            "writeErrors": [
                { "index": 0, "code": 72, "errmsg": "must be sent with write batch of size 1" },
                { "index": Bson::Int64(2), "code": 11000, "errmsg": "E11000 duplicate key" },
                { "code": 1, "errmsg": "no index" },
            ],
            "ok": 1.0,
        };

        assert_eq!(
            parse_write_errors(&reply, 0),
            vec![
                BulkWriteFailure::new(0, 72, "must be sent with write batch of size 1"),
                BulkWriteFailure::new(2, 11000, "E11000 duplicate key"),
            ]
        );
    }

    #[test]
    fn write_error_indices_point_into_the_batch() {
        let reply = doc! {
            "writeErrors": [{ "index": 1, "code": 11000, "errmsg": "E11000 duplicate key" }],
            "ok": 1.0,
        };

        assert_eq!(
            parse_write_errors(&reply, 500),
            vec![BulkWriteFailure::new(501, 11000, "E11000 duplicate key")]
        );
    }

    #[test]
    fn rejected_chunk_fails_each_item() {
        assert_eq!(
            chunk_failures(3..5, 10334, "BSONObj size is invalid"),
            vec![
                BulkWriteFailure::new(3, 10334, "BSONObj size is invalid"),
                BulkWriteFailure::new(4, 10334, "BSONObj size is invalid"),
            ]
        );
    }

    #[test]
    fn clean_reply_has_no_failures() {
        let reply = doc! { "n": 3, "nModified": 3, "ok": 1.0 };
        assert!(parse_write_errors(&reply, 0).is_empty());
        assert_eq!(write_concern_error(&reply), None);
    }

    #[test]
    fn write_concern_error_message_is_read() {
        let reply = doc! {
            "ok": 1.0,
            "writeConcernError": { "code": 64, "errmsg": "waiting for replication timed out" },
        };
        assert_eq!(
            write_concern_error(&reply).as_deref(),
            Some("waiting for replication timed out")
        );
    }
}
