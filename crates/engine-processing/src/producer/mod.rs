pub mod components;
pub mod config;

pub use components::reader::{DocumentReader, ReadSummary};
pub use config::ReaderConfig;
