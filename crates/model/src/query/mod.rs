pub mod filter;
pub mod key;
