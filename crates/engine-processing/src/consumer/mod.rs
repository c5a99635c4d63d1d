pub mod components;
pub mod config;
pub mod documents;

pub use config::WriterConfig;
pub use documents::DocumentsWriter;
