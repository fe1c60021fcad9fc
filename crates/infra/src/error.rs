//! Typed failures of the order lifecycle operations.

use thiserror::Error;

use minimart_core::{DomainError, OrderId, ProductId};

use crate::repository::StoreError;

/// Why an order operation was aborted.
///
/// Every variant is returned only after the enclosing transaction has been
/// rolled back; nothing the operation did before failing is kept.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// Malformed request or a broken entity rule.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// Storage failure, surfaced unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OrderError {
    /// Stable machine-readable code for this failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation_error",
            OrderError::InvalidQuantity { .. } => "invalid_quantity",
            OrderError::ProductNotFound(_) => "product_not_found",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::Store(_) => "store_error",
        }
    }
}

impl From<DomainError> for OrderError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => OrderError::Validation(msg),
        }
    }
}
