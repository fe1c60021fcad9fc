use serde::{Deserialize, Serialize};

use minimart_core::{DomainError, Entity, ProductId};

/// Catalog product with its on-hand stock.
///
/// `stock` never goes below zero. Stock changes happen through
/// [`Product::take_stock`] and [`Product::return_stock`], which the inventory
/// allocator calls while an order is created, edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    /// Price in smallest currency unit (e.g., cents).
    unit_price: u64,
    stock: i64,
}

impl Product {
    pub fn new(
        id: ProductId,
        name: impl Into<String>,
        unit_price: u64,
        stock: i64,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if unit_price == 0 {
            return Err(DomainError::validation("unit_price must be positive"));
        }
        if stock < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }

        Ok(Self {
            id,
            name,
            unit_price,
            stock,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    /// Whether `quantity` units can be taken without driving stock negative.
    pub fn has_stock_for(&self, quantity: i64) -> bool {
        quantity > 0 && self.stock >= quantity
    }

    /// Decrement stock by `quantity`.
    pub fn take_stock(&mut self, quantity: i64) -> Result<(), DomainError> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if self.stock < quantity {
            return Err(DomainError::invariant("stock cannot go negative"));
        }
        self.stock -= quantity;
        Ok(())
    }

    /// Increment stock by `quantity`. There is no upper bound.
    pub fn return_stock(&mut self, quantity: i64) -> Result<(), DomainError> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        self.stock = self
            .stock
            .checked_add(quantity)
            .ok_or_else(|| DomainError::invariant("stock overflow"))?;
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laptop(stock: i64) -> Product {
        Product::new(ProductId::new(), "Laptop", 80_000, stock).unwrap()
    }

    #[test]
    fn new_rejects_blank_name() {
        let err = Product::new(ProductId::new(), "   ", 100, 1).unwrap_err();
        assert_eq!(err, DomainError::validation("name cannot be empty"));
    }

    #[test]
    fn new_rejects_zero_price() {
        let err = Product::new(ProductId::new(), "Keyboard", 0, 1).unwrap_err();
        assert_eq!(err, DomainError::validation("unit_price must be positive"));
    }

    #[test]
    fn new_rejects_negative_stock() {
        assert!(Product::new(ProductId::new(), "Keyboard", 1500, -1).is_err());
    }

    #[test]
    fn take_stock_decrements() {
        let mut product = laptop(10);
        product.take_stock(4).unwrap();
        assert_eq!(product.stock(), 6);
    }

    #[test]
    fn take_stock_can_empty_the_shelf() {
        let mut product = laptop(3);
        product.take_stock(3).unwrap();
        assert_eq!(product.stock(), 0);
    }

    #[test]
    fn take_stock_refuses_to_go_negative() {
        let mut product = laptop(2);
        let err = product.take_stock(3).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(product.stock(), 2);
    }

    #[test]
    fn take_stock_rejects_non_positive_quantity() {
        let mut product = laptop(2);
        assert!(product.take_stock(0).is_err());
        assert!(product.take_stock(-5).is_err());
        assert_eq!(product.stock(), 2);
    }

    #[test]
    fn return_stock_has_no_ceiling() {
        let mut product = laptop(0);
        product.return_stock(1_000).unwrap();
        assert_eq!(product.stock(), 1_000);
    }

    #[test]
    fn return_stock_reports_overflow() {
        let mut product = laptop(i64::MAX);
        assert!(product.return_stock(1).is_err());
        assert_eq!(product.stock(), i64::MAX);
    }

    #[test]
    fn has_stock_for_matches_take_stock() {
        let product = laptop(5);
        assert!(product.has_stock_for(5));
        assert!(!product.has_stock_for(6));
        assert!(!product.has_stock_for(0));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: take followed by return of the same quantity is a no-op.
            #[test]
            fn take_then_return_restores_stock(
                stock in 0i64..1_000_000,
                quantity in 1i64..1_000_000,
            ) {
                let mut product = laptop(stock);
                if product.take_stock(quantity).is_ok() {
                    product.return_stock(quantity).unwrap();
                }
                prop_assert_eq!(product.stock(), stock);
            }

            /// Property: stock is never observed below zero.
            #[test]
            fn stock_never_negative(
                stock in 0i64..1_000,
                takes in prop::collection::vec(-10i64..100, 0..30),
            ) {
                let mut product = laptop(stock);
                for quantity in takes {
                    let _ = product.take_stock(quantity);
                    prop_assert!(product.stock() >= 0);
                }
            }
        }
    }
}
