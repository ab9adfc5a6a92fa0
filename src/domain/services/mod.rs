//! Pure domain services operating over aggregates.
pub mod alert_monitor;
pub mod order_assembler;
pub mod reservation;

pub use order_assembler::{assemble, OrderDraft, PricingPolicy};
