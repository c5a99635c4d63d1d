/// Configuration for the document reader.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Documents per cursor page and per batch
    pub batch_size: usize,

    /// Fields forming the destination write filter; `_id` when empty
    pub key_fields: Vec<String>,

    pub upsert: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            key_fields: Vec::new(),
            upsert: true,
        }
    }
}

impl ReaderConfig {
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn with_key_fields(mut self, fields: Vec<String>) -> Self {
        self.key_fields = fields;
        self
    }

    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }
}
