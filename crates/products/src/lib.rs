//! Products domain module.
//!
//! This crate contains the catalog product entity and its stock rules,
//! implemented purely as deterministic domain logic (no IO, no storage).

pub mod product;

pub use product::Product;
