//! In-process store for development and tests.
//!
//! State lives behind one mutex, so each call observes and writes a
//! consistent snapshot. It is not shared across service instances; use
//! [`PgStore`](super::PgStore) for anything beyond a single process.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{CartStore, Catalog, CheckoutCommit, InventoryStore, OrderStore};
use crate::domain::aggregates::{Cart, Order, Product, StockLedger};
use crate::{CommerceError, Result};

#[derive(Debug, Default)]
struct State {
    products: HashMap<String, Product>,
    ledgers: HashMap<String, StockLedger>,
    carts: HashMap<String, Cart>,
    orders: HashMap<String, Order>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| CommerceError::storage("memory store lock poisoned"))
    }

    /// Number of persisted orders.
    pub fn order_count(&self) -> Result<usize> {
        Ok(self.lock()?.orders.len())
    }
}

fn check_ledger_version(state: &State, ledger: &StockLedger) -> Result<()> {
    let stored = state
        .ledgers
        .get(ledger.product_id())
        .ok_or_else(|| CommerceError::not_found(format!("stock ledger {}", ledger.product_id())))?;
    if stored.version() != ledger.version() {
        return Err(CommerceError::conflict(format!(
            "stock ledger {} changed (expected version {}, found {})",
            ledger.product_id(), ledger.version(), stored.version()
        )));
    }
    Ok(())
}

fn check_cart_version(state: &State, cart: &Cart) -> Result<()> {
    let stored_version = state.carts.get(cart.id()).map(Cart::version).unwrap_or(0);
    if stored_version != cart.version() {
        return Err(CommerceError::conflict(format!(
            "cart {} changed (expected version {}, found {stored_version})", cart.id(), cart.version()
        )));
    }
    if cart.is_active()
        && state.carts.values().any(|c| c.is_active() && c.user_id() == cart.user_id() && c.id() != cart.id())
    {
        return Err(CommerceError::conflict(format!("user {} already has an active cart", cart.user_id())));
    }
    Ok(())
}

impl Catalog for MemoryStore {
    async fn product(&self, id: &str) -> Result<Option<Product>> {
        Ok(self.lock()?.products.get(id).cloned())
    }

    async fn insert_product(&self, product: Product, ledger: StockLedger) -> Result<()> {
        if product.id() != ledger.product_id() {
            return Err(CommerceError::validation("ledger belongs to a different product"));
        }
        let mut state = self.lock()?;
        if state.products.contains_key(product.id()) {
            return Err(CommerceError::validation(format!("product {} already exists", product.id())));
        }
        state.ledgers.insert(ledger.product_id().to_string(), ledger);
        state.products.insert(product.id().to_string(), product);
        Ok(())
    }
}

impl CartStore for MemoryStore {
    async fn active_cart(&self, user_id: &str) -> Result<Option<Cart>> {
        Ok(self.lock()?.carts.values().find(|c| c.is_active() && c.user_id() == user_id).cloned())
    }

    async fn save_cart(&self, mut cart: Cart) -> Result<Cart> {
        let mut state = self.lock()?;
        check_cart_version(&state, &cart)?;
        cart.bump_version();
        state.carts.insert(cart.id().to_string(), cart.clone());
        Ok(cart)
    }
}

impl InventoryStore for MemoryStore {
    async fn ledger(&self, product_id: &str) -> Result<Option<StockLedger>> {
        Ok(self.lock()?.ledgers.get(product_id).cloned())
    }

    async fn ledgers(&self) -> Result<Vec<StockLedger>> {
        let mut ledgers: Vec<StockLedger> = self.lock()?.ledgers.values().cloned().collect();
        ledgers.sort_by(|a, b| a.product_id().cmp(b.product_id()));
        Ok(ledgers)
    }

    async fn save_ledger(&self, mut ledger: StockLedger) -> Result<StockLedger> {
        let mut state = self.lock()?;
        check_ledger_version(&state, &ledger)?;
        ledger.bump_version();
        state.ledgers.insert(ledger.product_id().to_string(), ledger.clone());
        Ok(ledger)
    }
}

impl OrderStore for MemoryStore {
    async fn order(&self, id: &str) -> Result<Option<Order>> {
        Ok(self.lock()?.orders.get(id).cloned())
    }

    async fn commit_checkout(&self, commit: CheckoutCommit) -> Result<Order> {
        let CheckoutCommit { order, mut ledgers, mut cart } = commit;
        let mut state = self.lock()?;

        // Validate everything before the first write.
        for ledger in &ledgers {
            check_ledger_version(&state, ledger)?;
        }
        check_cart_version(&state, &cart)?;
        if state.orders.contains_key(order.id()) {
            return Err(CommerceError::conflict(format!("order {} already exists", order.id())));
        }

        for ledger in &mut ledgers {
            ledger.bump_version();
        }
        cart.bump_version();
        for ledger in ledgers {
            state.ledgers.insert(ledger.product_id().to_string(), ledger);
        }
        state.carts.insert(cart.id().to_string(), cart);
        state.orders.insert(order.id().to_string(), order.clone());
        Ok(order)
    }

    async fn update_order(&self, mut order: Order) -> Result<Order> {
        let mut state = self.lock()?;
        let stored = state
            .orders
            .get(order.id())
            .ok_or_else(|| CommerceError::not_found(format!("order {}", order.id())))?;
        if stored.version() != order.version() {
            return Err(CommerceError::conflict(format!(
                "order {} changed (expected version {}, found {})", order.id(), order.version(), stored.version()
            )));
        }
        order.bump_version();
        state.orders.insert(order.id().to_string(), order.clone());
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{Money, Sku};
    use rust_decimal::Decimal;

    fn product(id: &str) -> Product {
        Product::with_id(id, Sku::new(id).unwrap(), id, Money::usd(Decimal::ONE))
    }

    #[tokio::test]
    async fn test_stale_ledger_write_conflicts() {
        let store = MemoryStore::new();
        store.insert_product(product("P1"), StockLedger::new("P1", 0, 0)).await.unwrap();

        let mut first = store.ledger("P1").await.unwrap().unwrap();
        let mut second = first.clone();
        first.add(5, None, "a").unwrap();
        second.add(3, None, "b").unwrap();

        let saved = store.save_ledger(first).await.unwrap();
        assert_eq!(saved.version(), 1);
        assert!(matches!(store.save_ledger(second).await, Err(CommerceError::ConcurrencyConflict(_))));
        assert_eq!(store.ledger("P1").await.unwrap().unwrap().stock().current, 5);
    }

    #[tokio::test]
    async fn test_one_active_cart_per_user() {
        let store = MemoryStore::new();
        store.save_cart(Cart::for_user("u1", "USD")).await.unwrap();
        let err = store.save_cart(Cart::for_user("u1", "USD")).await.unwrap_err();
        assert!(matches!(err, CommerceError::ConcurrencyConflict(_)));
    }

    #[tokio::test]
    async fn test_stale_order_update_conflicts() {
        use crate::domain::aggregates::{Address, Order, PaymentMethod};
        use crate::domain::services::OrderDraft;

        let store = MemoryStore::new();
        let draft = OrderDraft {
            items: vec![],
            subtotal: Money::usd(Decimal::ZERO),
            discount: Money::usd(Decimal::ZERO),
            coupon_code: None,
            tax: Money::usd(Decimal::ZERO),
            shipping_cost: Money::usd(Decimal::ZERO),
            total_amount: Money::usd(Decimal::ZERO),
        };
        let order = Order::place(draft, "u1", Address::default(), PaymentMethod::Card, None);
        let commit = CheckoutCommit { order, ledgers: vec![], cart: Cart::for_user("u1", "USD") };
        let placed = store.commit_checkout(commit).await.unwrap();

        let mut first = placed.clone();
        let mut second = placed;
        first.confirm().unwrap();
        second.cancel().unwrap();
        assert_eq!(store.update_order(first).await.unwrap().version(), 1);
        assert!(matches!(store.update_order(second).await, Err(CommerceError::ConcurrencyConflict(_))));
    }

    #[tokio::test]
    async fn test_duplicate_product_rejected() {
        let store = MemoryStore::new();
        store.insert_product(product("P1"), StockLedger::new("P1", 0, 0)).await.unwrap();
        assert!(store.insert_product(product("P1"), StockLedger::new("P1", 0, 0)).await.is_err());
    }
}
