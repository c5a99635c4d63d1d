pub mod channel;
pub mod consumer;
pub mod error;
pub mod producer;
pub mod retry;

#[cfg(test)]
mod tests;
