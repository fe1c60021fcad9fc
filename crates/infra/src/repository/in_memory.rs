use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use minimart_core::{CustomerId, Entity, OrderId, ProductId};
use minimart_parties::Customer;
use minimart_products::Product;
use minimart_sales::{Order, OrderItem};

use super::query::{OrderPage, Pagination};
use super::r#trait::{Repository, StoreError, UnitOfWork};

/// Id-keyed table of entities.
struct Table<E: Entity> {
    rows: HashMap<E::Id, E>,
}

impl<E: Entity> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }
}

impl<E: Entity + Clone> Clone for Table<E> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
        }
    }
}

impl<E: Entity> core::fmt::Debug for Table<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Table").field("len", &self.rows.len()).finish()
    }
}

impl<E: Entity + Clone> Table<E> {
    fn get(&self, id: E::Id) -> Option<E> {
        self.rows.get(&id).cloned()
    }

    fn upsert(&mut self, entity: E) {
        self.rows.insert(entity.id(), entity);
    }
}

#[derive(Debug, Clone)]
struct OrderHeader {
    customer_id: CustomerId,
    created_at: DateTime<Utc>,
    total: u64,
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    products: Table<Product>,
    customers: Table<Customer>,
    orders: HashMap<OrderId, OrderHeader>,
    order_items: HashMap<OrderId, Vec<OrderItem>>,
}

impl StoreState {
    fn load_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let Some(header) = self.orders.get(&id) else {
            return Ok(None);
        };
        let items = self.order_items.get(&id).cloned().unwrap_or_default();
        Order::new(id, header.customer_id, header.created_at, items, header.total)
            .map(Some)
            .map_err(|e| StoreError::Corrupt(format!("order {id}: {e}")))
    }
}

/// In-memory transactional store.
///
/// Intended for tests/dev. Transactions are serialized: `begin` waits for the
/// previous transaction to finish, then works on a private copy of the state
/// that replaces the shared state on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    type Tx = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryUnitOfWork { guard, working })
    }
}

/// Open transaction on an [`InMemoryRepository`].
///
/// Dropping it without committing discards every write.
pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<StoreState>,
    working: StoreState,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.working.products.get(id))
    }

    async fn save_product(&mut self, product: &Product) -> Result<(), StoreError> {
        self.working.products.upsert(product.clone());
        Ok(())
    }

    async fn find_customer(&mut self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.working.customers.get(id))
    }

    async fn save_customer(&mut self, customer: &Customer) -> Result<(), StoreError> {
        self.working.customers.upsert(customer.clone());
        Ok(())
    }

    async fn find_order_with_items(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.working.load_order(id)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let id = order.id();
        if self.working.orders.contains_key(&id) {
            return Err(StoreError::Conflict(format!("order {id} already exists")));
        }
        self.working.orders.insert(
            id,
            OrderHeader {
                customer_id: order.customer_id(),
                created_at: order.created_at(),
                total: order.total(),
            },
        );
        self.working.order_items.insert(id, order.items().to_vec());
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let id = order.id();
        let header = self
            .working
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::Query(format!("order {id} does not exist")))?;
        header.customer_id = order.customer_id();
        header.total = order.total();
        Ok(())
    }

    async fn replace_order_items(
        &mut self,
        order_id: OrderId,
        items: &[OrderItem],
    ) -> Result<(), StoreError> {
        if !self.working.orders.contains_key(&order_id) {
            return Err(StoreError::Query(format!("order {order_id} does not exist")));
        }
        self.working.order_items.insert(order_id, items.to_vec());
        Ok(())
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<(), StoreError> {
        if self.working.orders.remove(&id).is_none() {
            return Err(StoreError::Query(format!("order {id} does not exist")));
        }
        self.working.order_items.remove(&id);
        Ok(())
    }

    async fn list_orders(&mut self, pagination: Pagination) -> Result<OrderPage, StoreError> {
        let mut ids: Vec<(DateTime<Utc>, OrderId)> = self
            .working
            .orders
            .iter()
            .map(|(id, header)| (header.created_at, *id))
            .collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));

        let offset = usize::try_from(pagination.offset()).unwrap_or(usize::MAX);
        let mut orders = Vec::with_capacity(pagination.page_size as usize);
        for (_, id) in ids.iter().skip(offset).take(pagination.page_size as usize) {
            if let Some(order) = self.working.load_order(*id)? {
                orders.push(order);
            }
        }

        Ok(OrderPage {
            orders,
            total: ids.len() as u64,
            page: pagination.page,
            page_size: pagination.page_size,
        })
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        *self.guard = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
