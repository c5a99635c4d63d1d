//! In-memory collaborators for exercising the pipeline without a database.
//!
//! [`memory::MemoryCollection`] implements the source, destination and key-finder
//! surfaces over a `Vec<Document>` and supports failure injection:
//!
//! - per-item bulk write failures (`fail_bulk_items`)
//! - whole-request bulk failures without per-item details (`fail_bulk_requests`)
//! - single-document write failures (`fail_single_writes`)
//! - write latency (`delay_writes`)
//! - transient query failures (`fail_queries_transiently`)
//!
//! Compiled for this crate's own tests and behind the `testing` feature.

pub mod memory;

pub use memory::{FailureRule, MemoryCollection};
