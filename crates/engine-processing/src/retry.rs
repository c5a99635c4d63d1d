use engine_core::{error::BulkWriteFailure, retry::RetryDisposition};

/// Fragment of the server message returned when a replace changes a document's shard key
/// so that it has to move to another shard. Such writes are only accepted in a batch of one.
pub const SHARD_KEY_RELOCATION_MESSAGE: &str = "must be sent with write batch of size 1";

pub fn is_shard_key_relocation(message: &str) -> bool {
    message
        .to_ascii_lowercase()
        .contains(SHARD_KEY_RELOCATION_MESSAGE)
}

/// Relocation failures go to the single-document retry tier, anything else is terminal.
pub fn classify_bulk_failure(failure: &BulkWriteFailure) -> RetryDisposition {
    if is_shard_key_relocation(&failure.message) {
        RetryDisposition::Retry
    } else {
        RetryDisposition::Stop
    }
}
