pub mod batch;
pub mod replace;
