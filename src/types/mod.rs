pub mod distribution;
pub mod errors;
