//! Transactional storage for products, customers and orders.
//!
//! The engine talks to storage only through [`Repository::begin`] and the
//! returned [`UnitOfWork`]. Two backends are provided:
//!
//! - [`InMemoryRepository`]: serialized transactions over process memory
//!   (tests, dev, the seeded batch runner)
//! - [`PostgresRepository`]: SQLx transactions with row locks on products

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;

pub use in_memory::{InMemoryRepository, InMemoryUnitOfWork};
pub use postgres::{PostgresRepository, PostgresUnitOfWork};
pub use query::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, OrderPage, Pagination};
pub use r#trait::{Repository, StoreError, UnitOfWork};
