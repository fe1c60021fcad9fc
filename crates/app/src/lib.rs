//! Batch runner: JSON commands in, JSON results out.

pub mod batch;
pub mod dto;
pub mod errors;

pub use batch::{BatchSummary, execute, run_batch};
pub use dto::BatchCommand;
