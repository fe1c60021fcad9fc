use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use minimart_core::{CustomerId, OrderId, ProductId};
use minimart_parties::Customer;
use minimart_products::Product;
use minimart_sales::{Order, OrderItem};

use super::query::{OrderPage, Pagination};

/// Storage operation error.
///
/// These are **infrastructure errors** (connectivity, isolation conflicts,
/// unreadable rows) as opposed to business-rule failures. The engine never
/// retries them; they are surfaced unchanged after rollback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store cannot be reached (pool closed, IO failure).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the transaction (serialization failure, deadlock,
    /// unique violation).
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// A stored record could not be turned back into a domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Any other query failure.
    #[error("query failed: {0}")]
    Query(String),
}

/// One open transaction against the store.
///
/// Every read and write goes through the unit of work that authorized it.
/// Writes stay invisible to other transactions until [`UnitOfWork::commit`];
/// [`UnitOfWork::rollback`] (or dropping the value) discards them.
///
/// ## Implementation Requirements
///
/// - `find_*` must observe this transaction's own earlier writes.
/// - `find_product` must prevent a concurrent transaction from reserving the
///   same stock (row locks, serializable isolation, or a single-writer lock).
/// - `insert_order` persists the order header and all of its items.
/// - `delete_order` removes the order header and all of its items.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn save_product(&mut self, product: &Product) -> Result<(), StoreError>;

    async fn find_customer(&mut self, id: CustomerId) -> Result<Option<Customer>, StoreError>;

    async fn save_customer(&mut self, customer: &Customer) -> Result<(), StoreError>;

    async fn find_order_with_items(&mut self, id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;

    /// Persist the order header (customer reference, total).
    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError>;

    /// Drop every stored item of `order_id` and store `items` in their place.
    async fn replace_order_items(
        &mut self,
        order_id: OrderId,
        items: &[OrderItem],
    ) -> Result<(), StoreError>;

    async fn delete_order(&mut self, id: OrderId) -> Result<(), StoreError>;

    /// One page of orders, newest first.
    async fn list_orders(&mut self, pagination: Pagination) -> Result<OrderPage, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

/// Entry point to a transactional store.
#[async_trait]
pub trait Repository: Send + Sync {
    type Tx: UnitOfWork;

    /// Open a new transaction scope.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

#[async_trait]
impl<R> Repository for Arc<R>
where
    R: Repository + ?Sized,
{
    type Tx = R::Tx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        (**self).begin().await
    }
}
