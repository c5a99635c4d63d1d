pub mod error;
pub mod mongo;
