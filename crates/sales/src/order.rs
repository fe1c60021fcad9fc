use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use minimart_core::{CustomerId, DomainError, Entity, OrderId, OrderItemId, ProductId};

/// A requested order line: which product and how many, before pricing.
///
/// Lines are taken exactly as given. Two lines for the same product stay two
/// lines and are reserved independently.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl OrderLine {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Priced line item owned by an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    quantity: i64,
    /// Unit price captured when stock was reserved, in smallest currency unit.
    unit_price: u64,
}

impl OrderItem {
    /// Build a fresh item with a new id.
    pub fn new(
        order_id: OrderId,
        product_id: ProductId,
        quantity: i64,
        unit_price: u64,
    ) -> Result<Self, DomainError> {
        Self::restore(OrderItemId::new(), order_id, product_id, quantity, unit_price)
    }

    /// Rebuild an item from stored fields.
    pub fn restore(
        id: OrderItemId,
        order_id: OrderId,
        product_id: ProductId,
        quantity: i64,
        unit_price: u64,
    ) -> Result<Self, DomainError> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(Self {
            id,
            order_id,
            product_id,
            quantity,
            unit_price,
        })
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    /// `quantity × unit_price`, checked.
    pub fn line_total(&self) -> Result<u64, DomainError> {
        line_amount(self.quantity, self.unit_price)
    }
}

impl Entity for OrderItem {
    type Id = OrderItemId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// `quantity × unit_price` for a positive quantity, failing on overflow.
pub fn line_amount(quantity: i64, unit_price: u64) -> Result<u64, DomainError> {
    let quantity = u64::try_from(quantity)
        .map_err(|_| DomainError::validation("quantity must be positive"))?;
    quantity
        .checked_mul(unit_price)
        .ok_or_else(|| DomainError::validation("line amount overflows"))
}

/// Sum of every item's line total.
pub fn items_total(items: &[OrderItem]) -> Result<u64, DomainError> {
    items.iter().try_fold(0u64, |acc, item| {
        acc.checked_add(item.line_total()?)
            .ok_or_else(|| DomainError::validation("order total overflows"))
    })
}

/// An order and the items it exclusively owns.
///
/// `total` always equals the sum of the items' `quantity × unit_price`; every
/// constructor and mutator re-checks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    created_at: DateTime<Utc>,
    total: u64,
    items: Vec<OrderItem>,
}

impl Order {
    pub fn new(
        id: OrderId,
        customer_id: CustomerId,
        created_at: DateTime<Utc>,
        items: Vec<OrderItem>,
        total: u64,
    ) -> Result<Self, DomainError> {
        ensure_items(id, &items, total)?;
        Ok(Self {
            id,
            customer_id,
            created_at,
            total,
            items,
        })
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Replace the customer and the whole item set in one step.
    ///
    /// On error the order is left untouched.
    pub fn revise(
        &mut self,
        customer_id: CustomerId,
        items: Vec<OrderItem>,
        total: u64,
    ) -> Result<(), DomainError> {
        ensure_items(self.id, &items, total)?;
        self.customer_id = customer_id;
        self.items = items;
        self.total = total;
        Ok(())
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

fn ensure_items(order_id: OrderId, items: &[OrderItem], total: u64) -> Result<(), DomainError> {
    if items.is_empty() {
        return Err(DomainError::validation("order must contain at least one item"));
    }
    if let Some(stray) = items.iter().find(|i| i.order_id != order_id) {
        return Err(DomainError::invariant(format!(
            "item {} belongs to order {}",
            stray.id, stray.order_id
        )));
    }
    let expected = items_total(items)?;
    if expected != total {
        return Err(DomainError::invariant(format!(
            "order total {total} does not match item sum {expected}"
        )));
    }
    Ok(())
}
