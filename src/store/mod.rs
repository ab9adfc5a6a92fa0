//! Persistence collaborators.
//!
//! The commerce core talks to storage through four narrow traits. Every
//! versioned document (stock ledgers, carts, orders) is written with an optimistic
//! check: the write succeeds only when the stored version still equals the
//! version that was read, otherwise it fails with
//! [`CommerceError::ConcurrencyConflict`](crate::CommerceError) and nothing
//! is written.

pub mod memory;
pub mod postgres;
pub mod seed;

use std::future::Future;

use crate::domain::aggregates::{Cart, Order, Product, StockLedger};
use crate::Result;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Everything a successful checkout writes, committed as one unit.
#[derive(Debug, Clone)]
pub struct CheckoutCommit {
    pub order: Order,
    pub ledgers: Vec<StockLedger>,
    pub cart: Cart,
}

pub trait Catalog: Send + Sync {
    fn product(&self, id: &str) -> impl Future<Output = Result<Option<Product>>> + Send;

    /// Registers a product together with its 1:1 stock ledger.
    fn insert_product(&self, product: Product, ledger: StockLedger) -> impl Future<Output = Result<()>> + Send;
}

pub trait CartStore: Send + Sync {
    fn active_cart(&self, user_id: &str) -> impl Future<Output = Result<Option<Cart>>> + Send;

    /// Returns the cart as stored, with its version bumped.
    fn save_cart(&self, cart: Cart) -> impl Future<Output = Result<Cart>> + Send;
}

pub trait InventoryStore: Send + Sync {
    fn ledger(&self, product_id: &str) -> impl Future<Output = Result<Option<StockLedger>>> + Send;

    fn ledgers(&self) -> impl Future<Output = Result<Vec<StockLedger>>> + Send;

    /// Returns the ledger as stored, with its version bumped.
    fn save_ledger(&self, ledger: StockLedger) -> impl Future<Output = Result<StockLedger>> + Send;
}

pub trait OrderStore: Send + Sync {
    fn order(&self, id: &str) -> impl Future<Output = Result<Option<Order>>> + Send;

    /// Persists the order, every mutated ledger and the cleared cart, or
    /// nothing at all.
    fn commit_checkout(&self, commit: CheckoutCommit) -> impl Future<Output = Result<Order>> + Send;

    /// Saves a status change on a placed order. Returns the order as
    /// stored, with its version bumped.
    fn update_order(&self, order: Order) -> impl Future<Output = Result<Order>> + Send;
}

pub trait CommerceStore: Catalog + CartStore + InventoryStore + OrderStore + 'static {}

impl<T> CommerceStore for T where T: Catalog + CartStore + InventoryStore + OrderStore + 'static {}
