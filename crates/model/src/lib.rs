pub mod execution;
pub mod query;
pub mod records;
