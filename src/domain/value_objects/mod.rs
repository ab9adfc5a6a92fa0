//! Value Objects for commerce

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 50 { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Sku {
    type Error = SkuError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self { sku.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkuError {
    #[error("SKU empty")]
    Empty,
    #[error("SKU too long")]
    TooLong,
}

/// Money value object. Amounts are kept at full precision; `rounded` brings
/// them back to cents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_uppercase() } }
    pub fn usd(amount: Decimal) -> Self { Self::new(amount, "USD") }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_positive(&self) -> bool { self.amount > Decimal::ZERO }
    pub fn is_negative(&self) -> bool { self.amount < Decimal::ZERO }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }

    /// Subtracts `other`, clamping the result at zero.
    pub fn saturating_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        Ok(Money::new((self.amount - other.amount).max(Decimal::ZERO), &self.currency))
    }

    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }

    /// Applies a fractional rate, e.g. `0.08` for an 8% tax.
    pub fn scale(&self, rate: Decimal) -> Money { Money::new(self.amount * rate, &self.currency).rounded() }

    pub fn min(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        Ok(if self.amount <= other.amount { self.clone() } else { other.clone() })
    }

    pub fn rounded(&self) -> Money {
        Money::new(self.amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero), &self.currency)
    }

    fn same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch { left: self.currency.clone(), right: other.currency.clone() });
        }
        Ok(())
    }
}

impl Default for Money { fn default() -> Self { Self::zero("USD") } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.amount, self.currency) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_sku() { let sku = Sku::new("prod-001").unwrap(); assert_eq!(sku.as_str(), "PROD-001"); }
    #[test]
    fn test_sku_rejects_blank() { assert_eq!(Sku::new("   "), Err(SkuError::Empty)); }
    #[test]
    fn test_money_add() {
        let a = Money::usd(Decimal::new(100, 0));
        let b = Money::usd(Decimal::new(50, 0));
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150, 0));
    }
    #[test]
    fn test_money_currency_mismatch() {
        let a = Money::usd(Decimal::ONE);
        let b = Money::new(Decimal::ONE, "eur");
        assert!(matches!(a.add(&b), Err(MoneyError::CurrencyMismatch { .. })));
    }
    #[test]
    fn test_money_scale_rounds_to_cents() {
        let price = Money::usd(Decimal::new(1999, 2));
        assert_eq!(price.scale(Decimal::new(8, 2)).amount(), Decimal::new(160, 2));
    }
    #[test]
    fn test_saturating_sub_never_negative() {
        let a = Money::usd(Decimal::new(5, 0));
        let b = Money::usd(Decimal::new(9, 0));
        assert_eq!(a.saturating_sub(&b).unwrap().amount(), Decimal::ZERO);
    }
}
