use crate::query::key::ID_FIELD;
use bson::{Bson, Document};

/// A single replace operation against the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceSpec {
    /// Selects at most one destination document.
    pub filter: Document,
    /// The source document, written as is.
    pub replacement: Document,
    pub upsert: bool,
}

impl ReplaceSpec {
    pub fn new(filter: Document, replacement: Document, upsert: bool) -> Self {
        Self {
            filter,
            replacement,
            upsert,
        }
    }

    /// `_id` of the replacement document, used when logging failures.
    pub fn id(&self) -> Option<&Bson> {
        self.replacement.get(ID_FIELD)
    }

    pub fn id_display(&self) -> String {
        self.id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "<no _id>".to_string())
    }
}
