//! Postgres-backed repository implementation.
//!
//! Each [`PostgresUnitOfWork`] wraps one SQLx transaction. Product and order
//! rows are read with `SELECT ... FOR UPDATE`, so two transactions reserving
//! the same product are serialized by row locks instead of both reading the
//! same stock value.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (serialization failure) | `40001` | `Conflict` |
//! | Database (deadlock detected) | `40P01` | `Conflict` |
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | Any other | `Query` |
//! | PoolClosed / PoolTimedOut / Io / Tls | N/A | `Unavailable` |
//! | ColumnDecode / Decode / RowNotFound | N/A | `Corrupt` |
//! | Other | N/A | `Query` |

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use minimart_core::{CustomerId, Entity, OrderId, OrderItemId, ProductId};
use minimart_parties::{ContactInfo, Customer};
use minimart_products::Product;
use minimart_sales::{Order, OrderItem};

use super::query::{OrderPage, Pagination};
use super::r#trait::{Repository, StoreError, UnitOfWork};

/// Schema applied by [`PostgresRepository::migrate`].
pub const SCHEMA: &str = include_str!("../../migrations/0001_orders.sql");

/// Postgres-backed transactional store.
///
/// Uses the SQLx connection pool, which is thread-safe (Arc + Send + Sync).
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: Arc<PgPool>,
}

impl PostgresRepository {
    /// Create a new repository over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect a fresh pool to `database_url`.
    #[instrument(skip(database_url), err)]
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    type Tx = PostgresUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PostgresUnitOfWork { tx })
    }
}

/// One open Postgres transaction.
///
/// Dropping it without committing rolls the transaction back.
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PostgresUnitOfWork {
    async fn load_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, unit_price
            FROM order_items
            WHERE order_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_items", e))?;

        rows.iter().map(item_from_row).collect()
    }

    async fn insert_items(&mut self, order_id: OrderId, items: &[OrderItem]) -> Result<(), StoreError> {
        for (idx, item) in items.iter().enumerate() {
            let line_no = i32::try_from(idx + 1)
                .map_err(|_| StoreError::Query("too many order items".to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, line_no, product_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(item.id().as_uuid())
            .bind(order_id.as_uuid())
            .bind(line_no)
            .bind(item.product_id().as_uuid())
            .bind(item.quantity())
            .bind(to_db_amount(item.unit_price())?)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_item", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, unit_price, stock
            FROM products
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn save_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, unit_price, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                unit_price = EXCLUDED.unit_price,
                stock = EXCLUDED.stock
            "#,
        )
        .bind(product.id().as_uuid())
        .bind(product.name())
        .bind(to_db_amount(product.unit_price())?)
        .bind(product.stock())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_product", e))?;
        Ok(())
    }

    async fn find_customer(&mut self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query("SELECT id, name, email, phone FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_customer", e))?;

        row.as_ref().map(customer_from_row).transpose()
    }

    async fn save_customer(&mut self, customer: &Customer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, email, phone)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone
            "#,
        )
        .bind(customer.id().as_uuid())
        .bind(customer.name())
        .bind(&customer.contact().email)
        .bind(customer.contact().phone.as_deref())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_customer", e))?;
        Ok(())
    }

    async fn find_order_with_items(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, created_at, total_amount
            FROM orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_order", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let header = header_from_row(&row)?;
        let items = self.load_items(id).await?;
        header.into_order(items).map(Some)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, created_at, total_amount)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.customer_id().as_uuid())
        .bind(order.created_at())
        .bind(to_db_amount(order.total())?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        self.insert_items(order.id(), order.items()).await?;
        debug!(order_id = %order.id(), items = order.items().len(), "order inserted");
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET customer_id = $2, total_amount = $3 WHERE id = $1",
        )
        .bind(order.id().as_uuid())
        .bind(order.customer_id().as_uuid())
        .bind(to_db_amount(order.total())?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_order", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Query(format!("order {} does not exist", order.id())));
        }
        Ok(())
    }

    async fn replace_order_items(
        &mut self,
        order_id: OrderId,
        items: &[OrderItem],
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_items", e))?;

        self.insert_items(order_id, items).await
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_items", e))?;

        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_order", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Query(format!("order {id} does not exist")));
        }
        Ok(())
    }

    async fn list_orders(&mut self, pagination: Pagination) -> Result<OrderPage, StoreError> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM orders")
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("count_orders", e))?
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_orders", e))?;

        let rows = sqlx::query(
            r#"
            SELECT id, customer_id, created_at, total_amount
            FROM orders
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(pagination.limit() as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_orders", e))?;

        let headers = rows
            .iter()
            .map(header_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let ids: Vec<Uuid> = headers.iter().map(|h| *h.id.as_uuid()).collect();

        let item_rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, unit_price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_no ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_order_items", e))?;

        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            let item = item_from_row(row)?;
            items_by_order.entry(item.order_id()).or_default().push(item);
        }

        let orders = headers
            .into_iter()
            .map(|h| {
                let items = items_by_order.remove(&h.id).unwrap_or_default();
                h.into_order(items)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OrderPage {
            orders,
            total: total.max(0) as u64,
            page: pagination.page,
            page_size: pagination.page_size,
        })
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback_transaction", e))
    }
}

// Row mapping

struct OrderHeaderRow {
    id: OrderId,
    customer_id: CustomerId,
    created_at: DateTime<Utc>,
    total: u64,
}

impl OrderHeaderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, StoreError> {
        Order::new(self.id, self.customer_id, self.created_at, items, self.total)
            .map_err(|e| StoreError::Corrupt(format!("order {}: {e}", self.id)))
    }
}

fn header_from_row(row: &PgRow) -> Result<OrderHeaderRow, StoreError> {
    let id: Uuid = row.try_get("id").map_err(|e| map_sqlx_error("read_order", e))?;
    let customer_id: Uuid = row
        .try_get("customer_id")
        .map_err(|e| map_sqlx_error("read_order", e))?;
    let created_at: DateTime<Utc> = row
        .try_get("created_at")
        .map_err(|e| map_sqlx_error("read_order", e))?;
    let total: i64 = row
        .try_get("total_amount")
        .map_err(|e| map_sqlx_error("read_order", e))?;

    Ok(OrderHeaderRow {
        id: OrderId::from_uuid(id),
        customer_id: CustomerId::from_uuid(customer_id),
        created_at,
        total: from_db_amount(total)?,
    })
}

fn item_from_row(row: &PgRow) -> Result<OrderItem, StoreError> {
    let id: Uuid = row.try_get("id").map_err(|e| map_sqlx_error("read_item", e))?;
    let order_id: Uuid = row.try_get("order_id").map_err(|e| map_sqlx_error("read_item", e))?;
    let product_id: Uuid = row
        .try_get("product_id")
        .map_err(|e| map_sqlx_error("read_item", e))?;
    let quantity: i64 = row.try_get("quantity").map_err(|e| map_sqlx_error("read_item", e))?;
    let unit_price: i64 = row
        .try_get("unit_price")
        .map_err(|e| map_sqlx_error("read_item", e))?;

    OrderItem::restore(
        OrderItemId::from_uuid(id),
        OrderId::from_uuid(order_id),
        ProductId::from_uuid(product_id),
        quantity,
        from_db_amount(unit_price)?,
    )
    .map_err(|e| StoreError::Corrupt(format!("order item {id}: {e}")))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let id: Uuid = row.try_get("id").map_err(|e| map_sqlx_error("read_product", e))?;
    let name: String = row.try_get("name").map_err(|e| map_sqlx_error("read_product", e))?;
    let unit_price: i64 = row
        .try_get("unit_price")
        .map_err(|e| map_sqlx_error("read_product", e))?;
    let stock: i64 = row.try_get("stock").map_err(|e| map_sqlx_error("read_product", e))?;

    Product::new(ProductId::from_uuid(id), name, from_db_amount(unit_price)?, stock)
        .map_err(|e| StoreError::Corrupt(format!("product {id}: {e}")))
}

fn customer_from_row(row: &PgRow) -> Result<Customer, StoreError> {
    let id: Uuid = row.try_get("id").map_err(|e| map_sqlx_error("read_customer", e))?;
    let name: String = row.try_get("name").map_err(|e| map_sqlx_error("read_customer", e))?;
    let email: String = row.try_get("email").map_err(|e| map_sqlx_error("read_customer", e))?;
    let phone: Option<String> = row.try_get("phone").map_err(|e| map_sqlx_error("read_customer", e))?;

    Customer::new(CustomerId::from_uuid(id), name, ContactInfo { email, phone })
        .map_err(|e| StoreError::Corrupt(format!("customer {id}: {e}")))
}

fn to_db_amount(amount: u64) -> Result<i64, StoreError> {
    i64::try_from(amount).map_err(|_| StoreError::Query(format!("amount {amount} exceeds BIGINT")))
}

fn from_db_amount(amount: i64) -> Result<u64, StoreError> {
    u64::try_from(amount).map_err(|_| StoreError::Corrupt(format!("negative amount {amount}")))
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("40001") | Some("40P01") | Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Query(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {operation}: {e}")),
        sqlx::Error::RowNotFound => StoreError::Corrupt(format!("row not found in {operation}")),
        sqlx::Error::ColumnDecode { index, source } => {
            StoreError::Corrupt(format!("failed to decode column {index} in {operation}: {source}"))
        }
        sqlx::Error::Decode(e) => StoreError::Corrupt(format!("decode error in {operation}: {e}")),
        other => StoreError::Query(format!("{operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo() -> PostgresRepository {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
        let repo = PostgresRepository::connect(&url).await.unwrap();
        repo.migrate().await.unwrap();
        repo
    }

    #[test]
    fn amounts_outside_bigint_are_rejected() {
        assert!(to_db_amount(u64::MAX).is_err());
        assert!(from_db_amount(-1).is_err());
        assert_eq!(to_db_amount(80_000).unwrap(), 80_000);
    }

    #[test]
    fn pool_errors_map_to_unavailable() {
        assert!(matches!(
            map_sqlx_error("begin", sqlx::Error::PoolClosed),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error("find", sqlx::Error::RowNotFound),
            StoreError::Corrupt(_)
        ));
    }

    #[tokio::test]
    #[ignore = "requires a Postgres database at DATABASE_URL"]
    async fn order_round_trips_through_postgres() {
        let repo = repo().await;
        let product = Product::new(ProductId::new(), "Keyboard", 1_500, 40).unwrap();
        let order_id = OrderId::new();
        let items = vec![
            OrderItem::new(order_id, product.id(), 2, 1_500).unwrap(),
            OrderItem::new(order_id, product.id(), 1, 1_500).unwrap(),
        ];
        let order = Order::new(order_id, CustomerId::new(), Utc::now(), items, 4_500).unwrap();

        let mut tx = repo.begin().await.unwrap();
        tx.save_product(&product).await.unwrap();
        tx.insert_order(&order).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = repo.begin().await.unwrap();
        let loaded = tx.find_order_with_items(order_id).await.unwrap().unwrap();
        assert_eq!(loaded.items().len(), 2);
        assert_eq!(loaded.total(), 4_500);
        assert_eq!(loaded.items()[0].quantity(), 2);
        tx.delete_order(order_id).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a Postgres database at DATABASE_URL"]
    async fn rollback_discards_stock_change() {
        let repo = repo().await;
        let mut product = Product::new(ProductId::new(), "Laptop", 80_000, 10).unwrap();

        let mut tx = repo.begin().await.unwrap();
        tx.save_product(&product).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = repo.begin().await.unwrap();
        product.take_stock(4).unwrap();
        tx.save_product(&product).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = repo.begin().await.unwrap();
        let stored = tx.find_product(product.id()).await.unwrap().unwrap();
        assert_eq!(stored.stock(), 10);
    }
}
