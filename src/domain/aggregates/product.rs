//! Product Aggregate
//!
//! The catalog owns products; the commerce core only reads the fields it
//! needs to price and validate a checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::{Money, Sku};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    id: String,
    sku: Sku,
    name: String,
    price: Money,
    discount_price: Option<Money>,
    status: ProductStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus { #[default] Draft, Active, Archived }

impl Product {
    pub fn create(sku: Sku, name: impl Into<String>, price: Money) -> Self {
        Self::with_id(Uuid::now_v7().to_string(), sku, name, price)
    }

    pub fn with_id(id: impl Into<String>, sku: Sku, name: impl Into<String>, price: Money) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(), sku, name: name.into(), price, discount_price: None,
            status: ProductStatus::Draft, created_at: now, updated_at: now,
        }
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn sku(&self) -> &Sku { &self.sku }
    pub fn name(&self) -> &str { &self.name }
    pub fn price(&self) -> &Money { &self.price }
    pub fn discount_price(&self) -> Option<&Money> { self.discount_price.as_ref() }
    pub fn status(&self) -> &ProductStatus { &self.status }
    pub fn is_active(&self) -> bool { self.status == ProductStatus::Active }

    /// Price a buyer pays right now: the discounted price when it is
    /// positive, the base price otherwise.
    pub fn effective_price(&self) -> &Money {
        match &self.discount_price {
            Some(d) if d.is_positive() => d,
            _ => &self.price,
        }
    }

    pub fn publish(&mut self) { self.status = ProductStatus::Active; self.touch(); }
    pub fn archive(&mut self) { self.status = ProductStatus::Archived; self.touch(); }

    pub fn set_discount_price(&mut self, discount: Option<Money>) {
        self.discount_price = discount;
        self.touch();
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}
