use crate::records::replace::ReplaceSpec;

/// Replace operations built from one cursor page.
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: String,
    pub items: Vec<ReplaceSpec>, // never empty, len <= batch size
    pub ts: chrono::DateTime<chrono::Utc>,
}

impl Batch {
    pub fn new(id: String, items: Vec<ReplaceSpec>) -> Self {
        Self {
            id,
            items,
            ts: chrono::Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
