//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod stock_ledger;

pub use product::{Product, ProductStatus};
pub use order::{Address, LineItem, Order, OrderError, OrderStatus, PaymentMethod, PaymentStatus};
pub use cart::{Cart, CartError, CartItem};
pub use stock_ledger::{
    Alert, AlertSeverity, AlertType, Batch, BatchDraw, BatchInfo, BatchStatus, LedgerChange, Movement,
    MovementType, SalesStats, StockLedger, StockLevels,
};
