pub mod executor;
pub mod factory;
pub mod prepare;
pub mod report;
pub mod reporter;
pub mod transit;

pub use executor::TransitExecutor;
pub use factory::{MongoRepositoryFactory, Repositories, RepositoryFactory};
pub use report::{CollectionOutcome, CollectionReport, TransitReport};
