//! PostgreSQL store.
//!
//! One JSONB document row per product, stock ledger, cart and order. Ledger
//! and cart rows carry a `version` column guarded by `WHERE version = $n`
//! updates; a checkout runs in a single transaction that is rolled back when
//! any guarded update misses or the future is dropped.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};

use super::{CartStore, Catalog, CheckoutCommit, InventoryStore, OrderStore};
use crate::domain::aggregates::{Cart, Order, Product, StockLedger};
use crate::{CommerceError, Result};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
    statement_timeout: Option<Duration>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, statement_timeout: None }
    }

    /// Bounds each statement of a checkout transaction on the server, so a
    /// stalled commit rolls back there instead of being abandoned mid-flight.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_version(version: u64) -> Result<i64> {
    i64::try_from(version).map_err(|_| CommerceError::inconsistency(format!("version {version} out of range")))
}

async fn update_ledger(tx: &mut Transaction<'static, Postgres>, ledger: &mut StockLedger) -> Result<()> {
    let expected = to_version(ledger.version())?;
    ledger.bump_version();
    let result = sqlx::query(
        "UPDATE stock_ledgers SET version = $1, document = $2, updated_at = NOW() WHERE product_id = $3 AND version = $4",
    )
    .bind(to_version(ledger.version())?)
    .bind(Json(&*ledger))
    .bind(ledger.product_id())
    .bind(expected)
    .execute(&mut **tx)
    .await
    .map_err(CommerceError::storage)?;
    if result.rows_affected() != 1 {
        return Err(CommerceError::conflict(format!("stock ledger {} changed", ledger.product_id())));
    }
    Ok(())
}

async fn upsert_cart(tx: &mut Transaction<'static, Postgres>, cart: &mut Cart) -> Result<()> {
    let expected = to_version(cart.version())?;
    cart.bump_version();
    let result = (if expected == 0 {
        sqlx::query(
            "INSERT INTO carts (id, user_id, is_active, version, document, updated_at) VALUES ($1, $2, $3, $4, $5, NOW()) ON CONFLICT DO NOTHING",
        )
        .bind(cart.id())
        .bind(cart.user_id())
        .bind(cart.is_active())
        .bind(to_version(cart.version())?)
        .bind(Json(&*cart))
        .execute(&mut **tx)
        .await
    } else {
        sqlx::query(
            "UPDATE carts SET is_active = $1, version = $2, document = $3, updated_at = NOW() WHERE id = $4 AND version = $5",
        )
        .bind(cart.is_active())
        .bind(to_version(cart.version())?)
        .bind(Json(&*cart))
        .bind(cart.id())
        .bind(expected)
        .execute(&mut **tx)
        .await
    })
    .map_err(CommerceError::storage)?;
    if result.rows_affected() != 1 {
        return Err(CommerceError::conflict(format!("cart {} changed", cart.id())));
    }
    Ok(())
}

impl Catalog for PgStore {
    async fn product(&self, id: &str) -> Result<Option<Product>> {
        let row: Option<(Json<Product>,)> = sqlx::query_as("SELECT document FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CommerceError::storage)?;
        Ok(row.map(|(Json(p),)| p))
    }

    async fn insert_product(&self, product: Product, ledger: StockLedger) -> Result<()> {
        if product.id() != ledger.product_id() {
            return Err(CommerceError::validation("ledger belongs to a different product"));
        }
        let mut tx = self.pool.begin().await.map_err(CommerceError::storage)?;
        let inserted = sqlx::query("INSERT INTO products (id, document) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
            .bind(product.id())
            .bind(Json(&product))
            .execute(&mut *tx)
            .await
            .map_err(CommerceError::storage)?;
        if inserted.rows_affected() == 0 {
            return Err(CommerceError::validation(format!("product {} already exists", product.id())));
        }
        sqlx::query("INSERT INTO stock_ledgers (product_id, version, document) VALUES ($1, $2, $3)")
            .bind(ledger.product_id())
            .bind(to_version(ledger.version())?)
            .bind(Json(&ledger))
            .execute(&mut *tx)
            .await
            .map_err(CommerceError::storage)?;
        tx.commit().await.map_err(CommerceError::storage)
    }
}

impl CartStore for PgStore {
    async fn active_cart(&self, user_id: &str) -> Result<Option<Cart>> {
        let row: Option<(Json<Cart>,)> = sqlx::query_as("SELECT document FROM carts WHERE user_id = $1 AND is_active")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CommerceError::storage)?;
        Ok(row.map(|(Json(c),)| c))
    }

    async fn save_cart(&self, mut cart: Cart) -> Result<Cart> {
        let mut tx = self.pool.begin().await.map_err(CommerceError::storage)?;
        upsert_cart(&mut tx, &mut cart).await?;
        tx.commit().await.map_err(CommerceError::storage)?;
        Ok(cart)
    }
}

impl InventoryStore for PgStore {
    async fn ledger(&self, product_id: &str) -> Result<Option<StockLedger>> {
        let row: Option<(Json<StockLedger>,)> = sqlx::query_as("SELECT document FROM stock_ledgers WHERE product_id = $1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CommerceError::storage)?;
        Ok(row.map(|(Json(l),)| l))
    }

    async fn ledgers(&self) -> Result<Vec<StockLedger>> {
        let rows: Vec<(Json<StockLedger>,)> = sqlx::query_as("SELECT document FROM stock_ledgers ORDER BY product_id")
            .fetch_all(&self.pool)
            .await
            .map_err(CommerceError::storage)?;
        Ok(rows.into_iter().map(|(Json(l),)| l).collect())
    }

    async fn save_ledger(&self, mut ledger: StockLedger) -> Result<StockLedger> {
        let mut tx = self.pool.begin().await.map_err(CommerceError::storage)?;
        update_ledger(&mut tx, &mut ledger).await?;
        tx.commit().await.map_err(CommerceError::storage)?;
        Ok(ledger)
    }
}

impl OrderStore for PgStore {
    async fn order(&self, id: &str) -> Result<Option<Order>> {
        let row: Option<(Json<Order>,)> = sqlx::query_as("SELECT document FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CommerceError::storage)?;
        Ok(row.map(|(Json(o),)| o))
    }

    async fn commit_checkout(&self, commit: CheckoutCommit) -> Result<Order> {
        let CheckoutCommit { order, mut ledgers, mut cart } = commit;
        // Fixed lock order across concurrent checkouts.
        ledgers.sort_by(|a, b| a.product_id().cmp(b.product_id()));

        let mut tx = self.pool.begin().await.map_err(CommerceError::storage)?;
        if let Some(timeout) = self.statement_timeout {
            // SET takes no bind parameters; the value is an integer.
            sqlx::query(&format!("SET LOCAL statement_timeout = {}", timeout.as_millis()))
                .execute(&mut *tx)
                .await
                .map_err(CommerceError::storage)?;
        }
        sqlx::query("INSERT INTO orders (id, order_number, user_id, version, document, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(order.id())
            .bind(order.order_number())
            .bind(order.user_id())
            .bind(to_version(order.version())?)
            .bind(Json(&order))
            .bind(order.created_at())
            .execute(&mut *tx)
            .await
            .map_err(CommerceError::storage)?;
        for ledger in &mut ledgers {
            update_ledger(&mut tx, ledger).await?;
        }
        upsert_cart(&mut tx, &mut cart).await?;
        tx.commit().await.map_err(CommerceError::storage)?;
        Ok(order)
    }

    async fn update_order(&self, mut order: Order) -> Result<Order> {
        let expected = to_version(order.version())?;
        order.bump_version();
        let result = sqlx::query("UPDATE orders SET version = $1, document = $2 WHERE id = $3 AND version = $4")
            .bind(to_version(order.version())?)
            .bind(Json(&order))
            .bind(order.id())
            .bind(expected)
            .execute(&self.pool)
            .await
            .map_err(CommerceError::storage)?;
        if result.rows_affected() != 1 {
            return Err(CommerceError::conflict(format!("order {} changed", order.id())));
        }
        Ok(order)
    }
}
