use crate::error::ProducerError;
use bson::Document;
use engine_core::connectors::destination::KeyFinder;
use model::{
    query::key::{ID_FIELD, key_filter},
    records::replace::ReplaceSpec,
};
use std::sync::Arc;
use tracing::trace;

/// Turns source documents into replace operations.
pub struct ReplaceTransformer {
    key_fields: Vec<String>,
    upsert: bool,
    key_finder: Option<Arc<dyn KeyFinder>>,
}

impl ReplaceTransformer {
    pub fn new(
        key_fields: Vec<String>,
        upsert: bool,
        key_finder: Option<Arc<dyn KeyFinder>>,
    ) -> Self {
        Self {
            key_fields,
            upsert,
            key_finder,
        }
    }

    /// Builds the replace for one document.
    ///
    /// With a key finder, the filter values come from the destination copy of the document
    /// when one exists, so a key that changed at the source still targets the right row.
    pub async fn transform(&self, document: Document) -> Result<ReplaceSpec, ProducerError> {
        let existing = match (&self.key_finder, document.get(ID_FIELD)) {
            (Some(finder), Some(id)) => {
                finder
                    .find_by_key(id)
                    .await
                    .map_err(|source| ProducerError::KeyLookup {
                        id: id.to_string(),
                        source,
                    })?
            }
            _ => None,
        };

        let filter = match &existing {
            Some(destination) => {
                trace!(id = ?document.get(ID_FIELD), "Using destination document for key filter");
                key_filter(&self.key_fields, destination)
            }
            None => key_filter(&self.key_fields, &document),
        };

        Ok(ReplaceSpec::new(filter, document, self.upsert))
    }

    /// Transforms a page, one key lookup at a time.
    pub async fn transform_all(
        &self,
        documents: Vec<Document>,
    ) -> Result<Vec<ReplaceSpec>, ProducerError> {
        let mut items = Vec::with_capacity(documents.len());
        for document in documents {
            items.push(self.transform(document).await?);
        }
        Ok(items)
    }
}
