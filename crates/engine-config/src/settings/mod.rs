pub mod file;
pub mod substitute;
pub mod validated;

pub use file::{CollectionConfig, ConnectionConfig, IterativeConfig, TransitConfig};
pub use validated::{CollectionSettings, TransitSettings};
