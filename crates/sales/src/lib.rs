//! Sales orders domain module.
//!
//! This crate contains business rules for orders and their line items,
//! implemented purely as deterministic domain logic (no IO, no storage).

pub mod order;

pub use order::{items_total, line_amount, Order, OrderItem, OrderLine};
