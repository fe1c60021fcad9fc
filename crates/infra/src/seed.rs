//! Starter catalog for an empty store.
//!
//! Ids are fixed so batch input can refer to seeded rows:
//! products are `00000000-0000-0000-0000-00000001000N`, customers
//! `00000000-0000-0000-0000-00000002000N`, with `N` starting at 1.

use tracing::{info, instrument};
use uuid::Uuid;

use minimart_core::{CustomerId, ProductId};
use minimart_parties::{ContactInfo, Customer};
use minimart_products::Product;

use crate::error::OrderError;
use crate::repository::{Repository, UnitOfWork};

const PRODUCTS: [(&str, u64, i64); 4] = [
    ("Laptop", 80_000, 10),
    ("Smartphone", 50_000, 15),
    ("Headphones", 3_000, 50),
    ("Keyboard", 1_500, 40),
];

const CUSTOMERS: [(&str, &str, &str); 4] = [
    ("Alice", "alice@example.com", "01711111111"),
    ("Bob", "bob@example.com", "01722222222"),
    ("Charlie", "charlie@example.com", "01733333333"),
    ("Diana", "diana@example.com", "01744444444"),
];

/// Id of the `n`th seeded product (1-based).
pub fn seeded_product_id(n: u16) -> ProductId {
    ProductId::from_uuid(Uuid::from_u128(0x1_0000 + u128::from(n)))
}

/// Id of the `n`th seeded customer (1-based).
pub fn seeded_customer_id(n: u16) -> CustomerId {
    CustomerId::from_uuid(Uuid::from_u128(0x2_0000 + u128::from(n)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededCatalog {
    pub products: Vec<Product>,
    pub customers: Vec<Customer>,
}

pub fn catalog() -> Result<SeededCatalog, OrderError> {
    let products = PRODUCTS
        .iter()
        .zip(1u16..)
        .map(|((name, price, stock), n)| Product::new(seeded_product_id(n), *name, *price, *stock))
        .collect::<Result<Vec<_>, _>>()?;

    let customers = CUSTOMERS
        .iter()
        .zip(1u16..)
        .map(|((name, email, phone), n)| {
            Customer::new(
                seeded_customer_id(n),
                *name,
                ContactInfo {
                    email: email.to_string(),
                    phone: Some(phone.to_string()),
                },
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SeededCatalog {
        products,
        customers,
    })
}

/// Write the starter catalog in one transaction. Existing rows with the same
/// ids are overwritten.
#[instrument(skip(repo), err)]
pub async fn seed_catalog<R: Repository>(repo: &R) -> Result<SeededCatalog, OrderError> {
    let catalog = catalog()?;

    let mut tx = repo.begin().await?;
    for product in &catalog.products {
        tx.save_product(product).await?;
    }
    for customer in &catalog.customers {
        tx.save_customer(customer).await?;
    }
    tx.commit().await?;

    info!(
        products = catalog.products.len(),
        customers = catalog.customers.len(),
        "catalog seeded"
    );
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;

    #[test]
    fn seeded_ids_are_stable_and_distinct() {
        assert_eq!(
            seeded_product_id(1).to_string(),
            "00000000-0000-0000-0000-000000010001"
        );
        assert_ne!(seeded_product_id(1), seeded_product_id(2));
        assert_ne!(*seeded_product_id(1).as_uuid(), *seeded_customer_id(1).as_uuid());
    }

    #[tokio::test]
    async fn seeding_fills_an_empty_store() {
        let repo = InMemoryRepository::new();
        seed_catalog(&repo).await.unwrap();

        let mut tx = repo.begin().await.unwrap();
        let laptop = tx.find_product(seeded_product_id(1)).await.unwrap().unwrap();
        assert_eq!(laptop.name(), "Laptop");
        assert_eq!(laptop.unit_price(), 80_000);
        assert_eq!(laptop.stock(), 10);

        let diana = tx.find_customer(seeded_customer_id(4)).await.unwrap().unwrap();
        assert_eq!(diana.contact().email, "diana@example.com");
    }
}
