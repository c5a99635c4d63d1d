pub mod connectors;
pub mod error;
pub mod progress;
pub mod retry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
