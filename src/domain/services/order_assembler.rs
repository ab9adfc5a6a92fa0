//! Cart validation and pricing.
//!
//! `assemble` is read-only: it re-reads live product and stock state through
//! the supplied lookups, re-prices every line and returns a draft. Running it
//! twice over unchanged state yields the same draft.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::aggregates::{Cart, LineItem, Product, StockLedger};
use crate::domain::value_objects::Money;
use crate::{CommerceError, Result};

/// Tax and shipping rules applied to every order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub currency: String,
    pub tax_rate: Decimal,
    /// Orders with a subtotal strictly above this ship free.
    pub free_shipping_threshold: Decimal,
    pub flat_shipping_fee: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            currency: "USD".into(),
            tax_rate: Decimal::new(8, 2),
            free_shipping_threshold: Decimal::new(100, 0),
            flat_shipping_fee: Decimal::new(10, 0),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub items: Vec<LineItem>,
    pub subtotal: Money,
    pub discount: Money,
    pub coupon_code: Option<String>,
    pub tax: Money,
    pub shipping_cost: Money,
    pub total_amount: Money,
}

impl OrderDraft {
    /// Total units requested per product.
    pub fn quantities(&self) -> HashMap<&str, u32> {
        let mut totals: HashMap<&str, u32> = HashMap::new();
        for item in &self.items {
            *totals.entry(item.product_id.as_str()).or_default() += item.quantity;
        }
        totals
    }
}

pub fn assemble<'a, P, L>(cart: &Cart, products: P, ledgers: L, policy: &PricingPolicy) -> Result<OrderDraft>
where
    P: Fn(&str) -> Option<&'a Product>,
    L: Fn(&str) -> Option<&'a StockLedger>,
{
    if cart.is_empty() {
        return Err(CommerceError::validation("cart is empty"));
    }
    if cart.currency() != policy.currency {
        return Err(CommerceError::validation(format!("cart currency {} is not {}", cart.currency(), policy.currency)));
    }

    let mut requested: HashMap<&str, u32> = HashMap::new();
    let mut items = Vec::with_capacity(cart.item_count());
    let mut subtotal = Money::zero(&policy.currency);

    for cart_item in cart.items() {
        if cart_item.quantity == 0 {
            return Err(CommerceError::validation(format!("quantity for {} must be positive", cart_item.product_id)));
        }
        let product = products(&cart_item.product_id)
            .filter(|p| p.is_active())
            .ok_or_else(|| CommerceError::ProductUnavailable { product_id: cart_item.product_id.clone() })?;
        let ledger = ledgers(&cart_item.product_id)
            .ok_or_else(|| CommerceError::inconsistency(format!("product {} has no stock ledger", product.id())))?;

        let wanted = requested.entry(product.id()).or_default();
        *wanted += cart_item.quantity;
        let sellable = ledger.sellable();
        if sellable < *wanted {
            return Err(CommerceError::InsufficientStock {
                product_id: product.id().to_string(),
                product: product.name().to_string(),
                available: sellable,
                requested: *wanted,
            });
        }

        let unit_price = product.effective_price().clone();
        let total = unit_price.multiply(cart_item.quantity);
        subtotal = subtotal.add(&total)?;
        items.push(LineItem {
            product_id: product.id().to_string(),
            name: product.name().to_string(),
            sku: product.sku().to_string(),
            quantity: cart_item.quantity,
            unit_price,
            total,
        });
    }

    let discount = cart.discount().min(&subtotal)?;
    let taxable = subtotal.saturating_sub(&discount)?;
    let tax = taxable.scale(policy.tax_rate);
    let shipping_cost = if subtotal.amount() > policy.free_shipping_threshold {
        Money::zero(&policy.currency)
    } else {
        Money::new(policy.flat_shipping_fee, &policy.currency)
    };
    let total_amount = taxable.add(&tax)?.add(&shipping_cost)?.rounded();

    Ok(OrderDraft {
        items,
        subtotal: subtotal.rounded(),
        discount,
        coupon_code: cart.coupon_code().map(str::to_string),
        tax,
        shipping_cost,
        total_amount,
    })
}
