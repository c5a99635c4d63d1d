pub mod prepare;
pub mod results;
