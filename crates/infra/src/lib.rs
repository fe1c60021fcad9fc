//! Infrastructure layer: transactional stores and the order lifecycle engine.
//!
//! ```text
//! OrderLifecycleService
//!   ↓
//! OrderAssembler → InventoryAllocator
//!   ↓
//! UnitOfWork (in-memory or Postgres)
//! ```

pub mod config;
pub mod error;
pub mod inventory_allocator;
pub mod order_assembler;
pub mod order_lifecycle;
pub mod repository;
pub mod seed;


pub use config::{ConfigError, EngineConfig, StoreBackend};
pub use error::OrderError;
pub use inventory_allocator::InventoryAllocator;
pub use order_assembler::{AssembledOrder, OrderAssembler};
pub use order_lifecycle::{OrderDetails, OrderLifecycleService};
