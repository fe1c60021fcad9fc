//! Order lifecycle orchestration.
//!
//! Every operation runs inside exactly one store transaction:
//!
//! ```text
//! begin
//!   ↓
//! load / allocate / assemble / persist   (all through the same unit of work)
//!   ↓
//! commit            on success
//! rollback          on the first error, which is then returned unchanged
//! ```
//!
//! Nothing an operation did is observable until the commit, and a failed
//! operation leaves stock, orders and items exactly as they were. Stock
//! reserved by earlier lines of a failing request is undone by the rollback,
//! never by hand-written compensation.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use minimart_core::{CustomerId, DomainError, Entity, OrderId};
use minimart_parties::Customer;
use minimart_sales::{Order, OrderLine};

use crate::config::EngineConfig;
use crate::error::OrderError;
use crate::inventory_allocator::InventoryAllocator;
use crate::order_assembler::OrderAssembler;
use crate::repository::{DEFAULT_PAGE_SIZE, OrderPage, Pagination, Repository, UnitOfWork};

/// An order together with the customer it references, if that customer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub customer: Option<Customer>,
}

/// Creates, edits and deletes orders atomically against a [`Repository`].
#[derive(Debug, Clone)]
pub struct OrderLifecycleService<R> {
    repo: R,
    allocator: InventoryAllocator,
    assembler: OrderAssembler,
    page_size: u32,
}

impl<R> OrderLifecycleService<R> {
    pub fn new(repo: R) -> Self {
        let allocator = InventoryAllocator::new();
        Self {
            repo,
            allocator,
            assembler: OrderAssembler::new(allocator),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn from_config(repo: R, config: &EngineConfig) -> Self {
        Self::new(repo).with_page_size(config.page_size)
    }

    /// Page size used by [`OrderLifecycleService::list_orders`].
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }
}

impl<R: Repository> OrderLifecycleService<R> {
    /// Reserve stock for `lines` and persist a new order for `customer_id`.
    ///
    /// The customer is not required to exist.
    #[instrument(skip(self, lines), fields(customer_id = %customer_id, lines = lines.len()), err)]
    pub async fn create_order(
        &self,
        customer_id: CustomerId,
        lines: &[OrderLine],
    ) -> Result<Order, OrderError> {
        ensure_lines(lines)?;

        let mut tx = self.repo.begin().await?;
        match self.create_in(&mut tx, customer_id, lines).await {
            Ok(order) => {
                tx.commit().await?;
                info!(order_id = %order.id(), total = order.total(), "order created");
                Ok(order)
            }
            Err(err) => Err(abort(tx, err).await),
        }
    }

    /// Release the order's current items, then rebuild it from `lines`
    /// against the restored stock.
    #[instrument(skip(self, lines), fields(order_id = %order_id, customer_id = %customer_id, lines = lines.len()), err)]
    pub async fn edit_order(
        &self,
        order_id: OrderId,
        customer_id: CustomerId,
        lines: &[OrderLine],
    ) -> Result<Order, OrderError> {
        ensure_lines(lines)?;

        let mut tx = self.repo.begin().await?;
        match self.edit_in(&mut tx, order_id, customer_id, lines).await {
            Ok(order) => {
                tx.commit().await?;
                info!(total = order.total(), "order edited");
                Ok(order)
            }
            Err(err) => Err(abort(tx, err).await),
        }
    }

    /// Return every item's stock and remove the order.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn delete_order(&self, order_id: OrderId) -> Result<(), OrderError> {
        let mut tx = self.repo.begin().await?;
        match self.delete_in(&mut tx, order_id).await {
            Ok(()) => {
                tx.commit().await?;
                info!("order deleted");
                Ok(())
            }
            Err(err) => Err(abort(tx, err).await),
        }
    }

    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn get_order(&self, order_id: OrderId) -> Result<OrderDetails, OrderError> {
        let mut tx = self.repo.begin().await?;
        let outcome = async {
            let order = tx
                .find_order_with_items(order_id)
                .await?
                .ok_or(OrderError::OrderNotFound(order_id))?;
            let customer = tx.find_customer(order.customer_id()).await?;
            Ok::<_, OrderError>(OrderDetails { order, customer })
        }
        .await;
        finish_read(tx, outcome).await
    }

    /// One page of orders, newest first. Page 0 is read as page 1.
    #[instrument(skip(self), err)]
    pub async fn list_orders(&self, page: u32) -> Result<OrderPage, OrderError> {
        let mut tx = self.repo.begin().await?;
        let outcome = tx
            .list_orders(Pagination::new(page, self.page_size))
            .await
            .map_err(OrderError::from);
        finish_read(tx, outcome).await
    }

    async fn create_in(
        &self,
        tx: &mut R::Tx,
        customer_id: CustomerId,
        lines: &[OrderLine],
    ) -> Result<Order, OrderError> {
        let order_id = OrderId::new();
        let assembled = self.assembler.assemble(tx, order_id, lines).await?;
        let order = Order::new(
            order_id,
            customer_id,
            Utc::now(),
            assembled.items,
            assembled.total,
        )?;
        tx.insert_order(&order).await?;
        Ok(order)
    }

    async fn edit_in(
        &self,
        tx: &mut R::Tx,
        order_id: OrderId,
        customer_id: CustomerId,
        lines: &[OrderLine],
    ) -> Result<Order, OrderError> {
        let mut order = tx
            .find_order_with_items(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;

        for item in order.items() {
            self.allocator
                .release(tx, item.product_id(), item.quantity())
                .await?;
        }

        let assembled = self.assembler.assemble(tx, order_id, lines).await?;
        order.revise(customer_id, assembled.items, assembled.total)?;

        tx.update_order(&order).await?;
        tx.replace_order_items(order_id, order.items()).await?;
        Ok(order)
    }

    async fn delete_in(&self, tx: &mut R::Tx, order_id: OrderId) -> Result<(), OrderError> {
        let order = tx
            .find_order_with_items(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;

        for item in order.items() {
            self.allocator
                .release(tx, item.product_id(), item.quantity())
                .await?;
        }

        tx.delete_order(order_id).await?;
        Ok(())
    }
}

fn ensure_lines(lines: &[OrderLine]) -> Result<(), OrderError> {
    if lines.is_empty() {
        return Err(DomainError::validation("order must contain at least one line").into());
    }
    Ok(())
}

/// Roll back and hand the original error back. A failing rollback is only logged.
async fn abort<U: UnitOfWork>(tx: U, err: OrderError) -> OrderError {
    if let Err(rollback_err) = tx.rollback().await {
        warn!(error = %rollback_err, "rollback failed");
    }
    warn!(error = %err, code = err.code(), "order operation rolled back");
    err
}

/// Read-only operations never commit.
async fn finish_read<U: UnitOfWork, T>(
    tx: U,
    outcome: Result<T, OrderError>,
) -> Result<T, OrderError> {
    if let Err(rollback_err) = tx.rollback().await {
        warn!(error = %rollback_err, "rollback of read transaction failed");
    }
    outcome
}
