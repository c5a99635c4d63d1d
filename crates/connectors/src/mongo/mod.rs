pub mod bulk;
pub mod client;
pub mod destination;
pub mod error;
pub mod source;

pub use client::MongoConnection;
pub use destination::MongoDestination;
pub use source::MongoSource;
