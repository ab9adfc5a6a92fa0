//! OpenSASE Commerce Core
//!
//! Order placement and inventory consistency engine for the OpenSASE
//! e-commerce backend.
//!
//! ## Features
//! - Batched, expiring stock ledgers with FIFO depletion
//! - Append-only stock movement audit trail
//! - Threshold-based low-stock, out-of-stock and expiry alerts
//! - All-or-nothing checkout from cart to order
//! - Optimistic concurrency across service instances

pub mod application;
pub mod config;
pub mod domain;
pub mod http;
pub mod notify;
pub mod store;

use thiserror::Error;

use crate::domain::aggregates::{CartError, OrderError};
use crate::domain::value_objects::{MoneyError, SkuError};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommerceError {
    /// Malformed input; the caller can correct and resubmit.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("product {product_id} is unavailable")]
    ProductUnavailable { product_id: String },

    #[error("insufficient stock for {product}: {available} available, {requested} requested")]
    InsufficientStock { product_id: String, product: String, available: u32, requested: u32 },

    /// The transaction lost a race with another writer; retry with fresh state.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("{0} not found")]
    NotFound(String),

    /// A ledger invariant was violated. Never recoverable by the caller.
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CommerceError {
    pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }
    pub fn conflict(msg: impl Into<String>) -> Self { Self::ConcurrencyConflict(msg.into()) }
    pub fn forbidden(msg: impl Into<String>) -> Self { Self::Authorization(msg.into()) }
    pub fn not_found(what: impl Into<String>) -> Self { Self::NotFound(what.into()) }
    pub fn inconsistency(msg: impl Into<String>) -> Self { Self::InternalInconsistency(msg.into()) }
    pub fn storage(err: impl std::fmt::Display) -> Self { Self::Storage(err.to_string()) }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::ProductUnavailable { .. } => "product_unavailable",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::ConcurrencyConflict(_) => "concurrency_conflict",
            Self::Authorization(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::InternalInconsistency(_) => "internal_inconsistency",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Fatal errors are server-side faults, not user mistakes.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InternalInconsistency(_) | Self::Storage(_))
    }

    pub fn is_retryable(&self) -> bool { matches!(self, Self::ConcurrencyConflict(_)) }
}

impl From<CartError> for CommerceError {
    fn from(e: CartError) -> Self { Self::Validation(e.to_string()) }
}

impl From<OrderError> for CommerceError {
    fn from(e: OrderError) -> Self { Self::Validation(e.to_string()) }
}

impl From<MoneyError> for CommerceError {
    fn from(e: MoneyError) -> Self { Self::Validation(e.to_string()) }
}

impl From<SkuError> for CommerceError {
    fn from(e: SkuError) -> Self { Self::Validation(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, CommerceError>;
