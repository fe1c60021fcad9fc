//! Stock reservation and release.
//!
//! The allocator is the only code path that changes a product's stock. It
//! never opens, commits or rolls back a transaction: every call runs inside
//! the unit of work handed in by the caller, so its writes become visible only
//! when that caller commits.

use tracing::{debug, instrument};

use minimart_core::ProductId;

use crate::error::OrderError;
use crate::repository::UnitOfWork;

#[derive(Debug, Default, Clone, Copy)]
pub struct InventoryAllocator;

impl InventoryAllocator {
    pub fn new() -> Self {
        Self
    }

    /// Take `quantity` units of a product and return its current unit price.
    ///
    /// Checks run in this order: the product exists, the quantity is
    /// positive, enough stock is on hand.
    #[instrument(skip(self, uow), fields(product_id = %product_id), err)]
    pub async fn reserve<U: UnitOfWork>(
        &self,
        uow: &mut U,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<u64, OrderError> {
        let mut product = uow
            .find_product(product_id)
            .await?
            .ok_or(OrderError::ProductNotFound(product_id))?;

        if quantity <= 0 {
            return Err(OrderError::InvalidQuantity {
                product_id,
                quantity,
            });
        }
        if !product.has_stock_for(quantity) {
            return Err(OrderError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.stock(),
            });
        }

        product.take_stock(quantity)?;
        uow.save_product(&product).await?;

        debug!(
            remaining = product.stock(),
            unit_price = product.unit_price(),
            "stock reserved"
        );
        Ok(product.unit_price())
    }

    /// Give `quantity` units back to a product. There is no upper bound on stock.
    #[instrument(skip(self, uow), fields(product_id = %product_id), err)]
    pub async fn release<U: UnitOfWork>(
        &self,
        uow: &mut U,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<(), OrderError> {
        let mut product = uow
            .find_product(product_id)
            .await?
            .ok_or(OrderError::ProductNotFound(product_id))?;

        product.return_stock(quantity)?;
        uow.save_product(&product).await?;

        debug!(stock = product.stock(), "stock released");
        Ok(())
    }
}
