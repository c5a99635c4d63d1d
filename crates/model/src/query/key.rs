use bson::{Bson, Document};

pub const ID_FIELD: &str = "_id";

/// Builds the equality filter that targets a document's row in the destination.
///
/// One clause per key field, in the configured order, with values taken from `key_source`.
/// Without key fields the filter falls back to `_id`. Missing values match `null`.
pub fn key_filter(key_fields: &[String], key_source: &Document) -> Document {
    let mut filter = Document::new();

    if key_fields.is_empty() {
        filter.insert(ID_FIELD, value_or_null(key_source.get(ID_FIELD)));
        return filter;
    }

    for field in key_fields {
        filter.insert(field.clone(), value_or_null(lookup_path(key_source, field)));
    }

    filter
}

/// Resolves a dotted path (`address.city`) through embedded documents.
pub fn lookup_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    if let Some(value) = document.get(path) {
        return Some(value);
    }

    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            _ => return None,
        };
    }

    Some(current)
}

fn value_or_null(value: Option<&Bson>) -> Bson {
    value.cloned().unwrap_or(Bson::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn falls_back_to_id_without_key_fields() {
        let document = doc! { "_id": 7, "name": "seven" };
        assert_eq!(key_filter(&[], &document), doc! { "_id": 7 });
    }

    #[test]
    fn keeps_configured_field_order() {
        let document = doc! { "_id": 1, "b": "x", "a": 2 };
        let filter = key_filter(&["a".to_string(), "b".to_string()], &document);

        let keys: Vec<&String> = filter.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(filter, doc! { "a": 2, "b": "x" });
    }

    #[test]
    fn resolves_nested_paths_and_missing_values() {
        let document = doc! { "_id": 1, "address": { "city": "Oslo" } };
        let filter = key_filter(
            &["address.city".to_string(), "zip".to_string()],
            &document,
        );

        assert_eq!(filter, doc! { "address.city": "Oslo", "zip": null });
    }
}
