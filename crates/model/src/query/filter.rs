use bson::{DateTime, Document, doc};
use serde::Serialize;
use std::fmt;

/// Describes which source documents are due for transfer.
///
/// A filter without a field is unconditional (full scan). A filter with a field selects
/// documents whose field is at or beyond the checkpoint, or, when no checkpoint is known,
/// every document that carries a non-null value for the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceFilter {
    field: Option<String>,
    checkpoint: Option<DateTime>,
}

impl SourceFilter {
    /// Match-all filter used by full transits.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn iterative(field: impl Into<String>, checkpoint: Option<DateTime>) -> Self {
        Self {
            field: Some(field.into()),
            checkpoint,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.field.is_none()
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn checkpoint(&self) -> Option<DateTime> {
        self.checkpoint
    }

    /// Renders the filter into a query predicate.
    ///
    /// The range is inclusive so documents written at the exact checkpoint instant are
    /// never missed; they are transferred again on the next cycle instead.
    pub fn render(&self) -> Document {
        let mut predicate = Document::new();
        match (&self.field, self.checkpoint) {
            (None, _) => {}
            (Some(field), Some(checkpoint)) => {
                predicate.insert(field.clone(), doc! { "$gte": checkpoint });
            }
            (Some(field), None) => {
                predicate.insert(field.clone(), doc! { "$exists": true, "$ne": null });
            }
        }
        predicate
    }
}

impl fmt::Display for SourceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.field, self.checkpoint) {
            (None, _) => f.write_str("all documents"),
            (Some(field), Some(checkpoint)) => write!(f, "{field} >= {checkpoint}"),
            (Some(field), None) => write!(f, "{field} exists"),
        }
    }
}
