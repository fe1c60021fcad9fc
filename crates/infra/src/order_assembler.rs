//! Turns requested lines into priced order items.

use tracing::instrument;

use minimart_core::{DomainError, OrderId};
use minimart_sales::{OrderItem, OrderLine};

use crate::error::OrderError;
use crate::inventory_allocator::InventoryAllocator;
use crate::repository::UnitOfWork;

/// Items built for one order and their summed amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledOrder {
    pub items: Vec<OrderItem>,
    pub total: u64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OrderAssembler {
    allocator: InventoryAllocator,
}

impl OrderAssembler {
    pub fn new(allocator: InventoryAllocator) -> Self {
        Self { allocator }
    }

    /// Reserve stock for each line in the given order and price it at the
    /// product's current unit price.
    ///
    /// Lines are neither reordered nor merged. The first failing line aborts
    /// assembly; reservations already made are left for the caller's rollback
    /// to undo.
    #[instrument(skip(self, uow, lines), fields(order_id = %order_id, lines = lines.len()), err)]
    pub async fn assemble<U: UnitOfWork>(
        &self,
        uow: &mut U,
        order_id: OrderId,
        lines: &[OrderLine],
    ) -> Result<AssembledOrder, OrderError> {
        let mut items = Vec::with_capacity(lines.len());
        let mut total = 0u64;

        for line in lines {
            let unit_price = self
                .allocator
                .reserve(uow, line.product_id, line.quantity)
                .await?;
            let item = OrderItem::new(order_id, line.product_id, line.quantity, unit_price)?;
            total = total
                .checked_add(item.line_total()?)
                .ok_or_else(|| DomainError::validation("order total overflows"))?;
            items.push(item);
        }

        Ok(AssembledOrder { items, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minimart_core::{Entity, ProductId};
    use minimart_products::Product;

    use crate::repository::{InMemoryRepository, Repository};

    async fn catalog(products: &[(u64, i64)]) -> (InMemoryRepository, Vec<ProductId>) {
        let repo = InMemoryRepository::new();
        let mut tx = repo.begin().await.unwrap();
        let mut ids = Vec::new();
        for (price, stock) in products {
            let p = Product::new(ProductId::new(), "Item", *price, *stock).unwrap();
            tx.save_product(&p).await.unwrap();
            ids.push(p.id());
        }
        tx.commit().await.unwrap();
        (repo, ids)
    }

    #[tokio::test]
    async fn prices_every_line_and_sums_total() {
        let (repo, ids) = catalog(&[(100, 10), (3_000, 50)]).await;
        let mut tx = repo.begin().await.unwrap();
        let order_id = OrderId::new();

        let assembled = OrderAssembler::default()
            .assemble(
                &mut tx,
                order_id,
                &[OrderLine::new(ids[0], 4), OrderLine::new(ids[1], 2)],
            )
            .await
            .unwrap();

        assert_eq!(assembled.total, 4 * 100 + 2 * 3_000);
        assert_eq!(assembled.items.len(), 2);
        assert_eq!(assembled.items[0].product_id(), ids[0]);
        assert_eq!(assembled.items[1].unit_price(), 3_000);
        assert!(assembled.items.iter().all(|i| i.order_id() == order_id));
    }

    #[tokio::test]
    async fn duplicate_lines_are_reserved_independently() {
        let (repo, ids) = catalog(&[(50, 5)]).await;
        let mut tx = repo.begin().await.unwrap();

        let assembled = OrderAssembler::default()
            .assemble(
                &mut tx,
                OrderId::new(),
                &[OrderLine::new(ids[0], 2), OrderLine::new(ids[0], 3)],
            )
            .await
            .unwrap();

        assert_eq!(assembled.items.len(), 2);
        assert_eq!(assembled.total, 250);
        assert_eq!(tx.find_product(ids[0]).await.unwrap().unwrap().stock(), 0);
    }

    #[tokio::test]
    async fn duplicate_lines_fail_once_combined_stock_runs_out() {
        let (repo, ids) = catalog(&[(50, 4)]).await;
        let mut tx = repo.begin().await.unwrap();

        let err = OrderAssembler::default()
            .assemble(
                &mut tx,
                OrderId::new(),
                &[OrderLine::new(ids[0], 3), OrderLine::new(ids[0], 3)],
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            OrderError::InsufficientStock {
                product_id: ids[0],
                requested: 3,
                available: 1
            }
        );
    }

    #[tokio::test]
    async fn failing_line_stops_assembly() {
        let (repo, ids) = catalog(&[(100, 10)]).await;
        let missing = ProductId::new();
        let mut tx = repo.begin().await.unwrap();

        let err = OrderAssembler::default()
            .assemble(
                &mut tx,
                OrderId::new(),
                &[
                    OrderLine::new(ids[0], 1),
                    OrderLine::new(missing, 1),
                    OrderLine::new(ids[0], 1),
                ],
            )
            .await
            .unwrap_err();

        assert_eq!(err, OrderError::ProductNotFound(missing));
        // First line reserved, third never reached.
        assert_eq!(tx.find_product(ids[0]).await.unwrap().unwrap().stock(), 9);
    }
}
