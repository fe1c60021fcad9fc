//! Parties domain module (customers).
//!
//! Customers are referenced by orders but owned elsewhere; this crate only
//! carries the entity and its validation rules.

pub mod customer;

pub use customer::{ContactInfo, Customer};
