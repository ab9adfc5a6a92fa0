//! Cart Aggregate
//!
//! One active cart per user. Item prices are the live catalog price at the
//! time the item was added; checkout re-prices everything and never trusts
//! them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cart {
    id: String,
    user_id: String,
    is_active: bool,
    items: Vec<CartItem>,
    coupon_code: Option<String>,
    discount: Money,
    subtotal: Money,
    total: Money,
    currency: String,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartItem {
    pub fn new(product_id: impl Into<String>, quantity: u32, unit_price: Money) -> Self {
        Self { product_id: product_id.into(), quantity, unit_price }
    }
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

impl Cart {
    pub fn for_user(user_id: impl Into<String>, currency: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(), user_id: user_id.into(), is_active: true,
            items: vec![], coupon_code: None, discount: Money::zero(currency),
            subtotal: Money::zero(currency), total: Money::zero(currency), currency: currency.to_uppercase(),
            version: 0, created_at: now, updated_at: now,
        }
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn user_id(&self) -> &str { &self.user_id }
    pub fn is_active(&self) -> bool { self.is_active }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn coupon_code(&self) -> Option<&str> { self.coupon_code.as_deref() }
    pub fn discount(&self) -> &Money { &self.discount }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn total(&self) -> &Money { &self.total }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn version(&self) -> u64 { self.version }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.quantity == 0 { return Err(CartError::InvalidQuantity); }
        if item.unit_price.currency() != self.currency { return Err(CartError::CurrencyMismatch); }
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == item.product_id) {
            existing.quantity = existing.quantity.checked_add(item.quantity).ok_or(CartError::InvalidQuantity)?;
            existing.unit_price = item.unit_price;
        } else {
            self.items.push(item);
        }
        self.recalculate();
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: &str) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        self.recalculate();
        Ok(())
    }

    pub fn apply_coupon(&mut self, code: impl Into<String>, discount: Money) -> Result<(), CartError> {
        if discount.currency() != self.currency { return Err(CartError::CurrencyMismatch); }
        if discount.is_negative() { return Err(CartError::InvalidDiscount); }
        self.coupon_code = Some(code.into());
        self.discount = discount;
        self.recalculate();
        Ok(())
    }

    /// Empties the cart after checkout. The cart keeps its identity and stays
    /// active for reuse.
    pub fn clear(&mut self) {
        self.items.clear();
        self.coupon_code = None;
        self.discount = Money::zero(&self.currency);
        self.recalculate();
    }

    pub(crate) fn bump_version(&mut self) { self.version += 1; }

    fn recalculate(&mut self) {
        self.subtotal = self.items.iter().fold(Money::zero(&self.currency), |acc, i| acc.add(&i.line_total()).unwrap_or(acc));
        self.total = self.subtotal.saturating_sub(&self.discount).unwrap_or_else(|_| self.subtotal.clone());
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("cart item not found")]
    ItemNotFound,
    #[error("cart item quantity must be between 1 and u32::MAX")]
    InvalidQuantity,
    #[error("cart currency mismatch")]
    CurrencyMismatch,
    #[error("discount cannot be negative")]
    InvalidDiscount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::for_user("u1", "USD");
        cart.add_item(CartItem::new("P1", 2, Money::usd(Decimal::new(10, 0)))).unwrap();
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.subtotal().amount(), Decimal::new(20, 0));
        cart.add_item(CartItem::new("P1", 1, Money::usd(Decimal::new(10, 0)))).unwrap();
        assert_eq!(cart.items()[0].quantity, 3); // Merged
    }

    #[test]
    fn test_merged_quantity_cannot_overflow() {
        let mut cart = Cart::for_user("u1", "USD");
        cart.add_item(CartItem::new("P1", u32::MAX - 1, Money::usd(Decimal::ONE))).unwrap();
        let err = cart.add_item(CartItem::new("P1", 2, Money::usd(Decimal::ONE))).unwrap_err();
        assert_eq!(err, CartError::InvalidQuantity);
        assert_eq!(cart.items()[0].quantity, u32::MAX - 1);
    }

    #[test]
    fn test_coupon_reduces_total_not_below_zero() {
        let mut cart = Cart::for_user("u1", "USD");
        cart.add_item(CartItem::new("P1", 1, Money::usd(Decimal::new(10, 0)))).unwrap();
        cart.apply_coupon("BIG", Money::usd(Decimal::new(25, 0))).unwrap();
        assert_eq!(cart.total().amount(), Decimal::ZERO);
    }

    #[test]
    fn test_clear_keeps_identity() {
        let mut cart = Cart::for_user("u1", "USD");
        let id = cart.id().to_string();
        cart.add_item(CartItem::new("P1", 2, Money::usd(Decimal::new(10, 0)))).unwrap();
        cart.apply_coupon("SAVE5", Money::usd(Decimal::new(5, 0))).unwrap();
        cart.clear();
        assert_eq!(cart.id(), id);
        assert!(cart.is_empty() && cart.is_active());
        assert_eq!(cart.subtotal().amount(), Decimal::ZERO);
        assert_eq!(cart.coupon_code(), None);
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut cart = Cart::for_user("u1", "USD");
        assert_eq!(cart.add_item(CartItem::new("P1", 0, Money::usd(Decimal::ONE))), Err(CartError::InvalidQuantity));
    }
}
