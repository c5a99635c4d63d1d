pub mod retry_writer;
pub mod writer;
