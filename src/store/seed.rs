//! Development catalog seeding.
//!
//! Loads products, their opening stock and optional starter carts from a
//! JSON file into whichever store the service runs on. Products that
//! already exist are left untouched, so restarting against a persistent
//! store is harmless.

use std::path::Path;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::CommerceStore;
use crate::domain::aggregates::{BatchInfo, Cart, CartItem, Product, StockLedger};
use crate::domain::value_objects::{Money, Sku};
use crate::{CommerceError, Result};

const SEED_ACTOR: &str = "seed";

#[derive(Debug, Default, Deserialize)]
pub struct SeedCatalog {
    #[serde(default)]
    pub products: Vec<SeedProduct>,
    #[serde(default)]
    pub carts: Vec<SeedCart>,
}

#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub reorder_level: u32,
    #[serde(default)]
    pub max_stock: u32,
    #[serde(default)]
    pub batches: Vec<SeedBatch>,
}

#[derive(Debug, Deserialize)]
pub struct SeedBatch {
    pub quantity: u32,
    pub batch_number: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub manufacture_date: Option<DateTime<Utc>>,
    pub cost_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct SeedCart {
    pub user_id: String,
    #[serde(default)]
    pub items: Vec<SeedCartItem>,
    pub coupon: Option<SeedCoupon>,
}

#[derive(Debug, Deserialize)]
pub struct SeedCartItem {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct SeedCoupon {
    pub code: String,
    pub discount: Decimal,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub products_inserted: usize,
    pub products_skipped: usize,
    pub carts_inserted: usize,
}

fn default_true() -> bool { true }

impl SeedCatalog {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

pub async fn seed<S: CommerceStore>(store: &S, catalog: SeedCatalog, currency: &str, near_expiry_days: u32) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for entry in catalog.products {
        if store.product(&entry.id).await?.is_some() {
            tracing::info!(product_id = %entry.id, "seed product already present, skipping");
            report.products_skipped += 1;
            continue;
        }
        let product_id = entry.id.clone();
        let (product, ledger) = build_product(entry, currency, near_expiry_days)?;
        store.insert_product(product, ledger).await?;
        tracing::debug!(%product_id, "seeded product");
        report.products_inserted += 1;
    }

    for entry in catalog.carts {
        if store.active_cart(&entry.user_id).await?.is_some() {
            tracing::info!(user_id = %entry.user_id, "user already has an active cart, skipping seed cart");
            continue;
        }
        let mut cart = Cart::for_user(&entry.user_id, currency);
        for item in &entry.items {
            let product = store
                .product(&item.product_id)
                .await?
                .ok_or_else(|| CommerceError::validation(format!("seed cart references unknown product {}", item.product_id)))?;
            cart.add_item(CartItem::new(&item.product_id, item.quantity, product.effective_price().clone()))?;
        }
        if let Some(coupon) = entry.coupon {
            cart.apply_coupon(coupon.code, Money::new(coupon.discount, currency))?;
        }
        store.save_cart(cart).await?;
        report.carts_inserted += 1;
    }

    tracing::info!(
        inserted = report.products_inserted, skipped = report.products_skipped, carts = report.carts_inserted,
        "catalog seeded"
    );
    Ok(report)
}

fn build_product(entry: SeedProduct, currency: &str, near_expiry_days: u32) -> Result<(Product, StockLedger)> {
    let sku = Sku::new(entry.sku)?;
    let mut product = Product::with_id(&entry.id, sku, entry.name, Money::new(entry.price, currency));
    product.set_discount_price(entry.discount_price.map(|d| Money::new(d, currency)));
    if entry.active {
        product.publish();
    }

    let mut ledger = StockLedger::new(&entry.id, entry.reorder_level, entry.max_stock).with_near_expiry_days(near_expiry_days);
    for batch in entry.batches {
        let info = BatchInfo {
            batch_number: batch.batch_number,
            expiry_date: batch.expiry_date,
            manufacture_date: batch.manufacture_date,
            cost_price: batch.cost_price.map(|c| Money::new(c, currency)),
        };
        ledger.add(batch.quantity, Some(info), SEED_ACTOR)?;
    }
    Ok((product, ledger))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CartStore, Catalog, InventoryStore, MemoryStore};

    const CATALOG: &str = r#"{
        "products": [
            {"id": "P1", "sku": "MILK-1L", "name": "Milk 1L", "price": "2.50", "reorder_level": 5, "max_stock": 200,
             "batches": [{"quantity": 10, "batch_number": "M-1", "expiry_date": "2030-01-01T00:00:00Z"},
                         {"quantity": 5, "batch_number": "M-2"}]},
            {"id": "P2", "sku": "BREAD", "name": "Bread", "price": "3.00", "discount_price": "2.00", "active": false}
        ],
        "carts": [{"user_id": "u1", "items": [{"product_id": "P1", "quantity": 2}]}]
    }"#;

    #[tokio::test]
    async fn test_seed_loads_products_stock_and_carts() {
        let store = MemoryStore::new();
        let catalog: SeedCatalog = serde_json::from_str(CATALOG).unwrap();
        let report = seed(&store, catalog, "USD", 30).await.unwrap();
        assert_eq!(report, SeedReport { products_inserted: 2, products_skipped: 0, carts_inserted: 1 });

        let ledger = store.ledger("P1").await.unwrap().unwrap();
        assert_eq!(ledger.stock().current, 15);
        assert_eq!(ledger.batches()[0].batch_number, "M-1");
        assert!(!store.product("P2").await.unwrap().unwrap().is_active());
        assert_eq!(store.active_cart("u1").await.unwrap().unwrap().items().len(), 1);
    }

    #[tokio::test]
    async fn test_reseeding_skips_existing_products() {
        let store = MemoryStore::new();
        seed(&store, serde_json::from_str(CATALOG).unwrap(), "USD", 30).await.unwrap();
        let report = seed(&store, serde_json::from_str(CATALOG).unwrap(), "USD", 30).await.unwrap();
        assert_eq!(report, SeedReport { products_inserted: 0, products_skipped: 2, carts_inserted: 0 });
    }
}
