//! Order Aggregate
//!
//! An order is immutable once placed: the line items are a snapshot of name,
//! SKU and price at purchase time. Only the order and payment statuses move.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::services::order_assembler::OrderDraft;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    id: String,
    order_number: String,
    user_id: String,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_method: PaymentMethod,
    items: Vec<LineItem>,
    subtotal: Money,
    discount: Money,
    coupon_code: Option<String>,
    tax: Money,
    shipping_cost: Money,
    total_amount: Money,
    shipping_address: Address,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    version: u64,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: String,
    pub name: String,
    pub sku: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total: Money,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address { pub name: String, pub street1: String, pub street2: Option<String>, pub city: String, pub state: Option<String>, pub zip: String, pub country: String }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Pending, Authorized, Paid, Refunded, Voided }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod { Card, Paypal, BankTransfer, CashOnDelivery }

impl Order {
    /// Builds a pending order from a priced draft.
    pub fn place(draft: OrderDraft, user_id: impl Into<String>, shipping_address: Address, payment_method: PaymentMethod, notes: Option<String>) -> Self {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now();
        let order_number = format!("ORD-{}-{}", now.format("%Y%m%d"), &Uuid::new_v4().simple().to_string()[..8].to_uppercase());
        let user_id = user_id.into();
        let mut order = Self {
            id: id.clone(), order_number, user_id: user_id.clone(),
            status: OrderStatus::Pending, payment_status: PaymentStatus::Pending, payment_method,
            items: draft.items, subtotal: draft.subtotal, discount: draft.discount, coupon_code: draft.coupon_code,
            tax: draft.tax, shipping_cost: draft.shipping_cost, total_amount: draft.total_amount,
            shipping_address, notes, created_at: now, updated_at: now, version: 0, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed { order_id: id, user_id, total: order.total_amount.amount() }));
        order
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn user_id(&self) -> &str { &self.user_id }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn discount(&self) -> &Money { &self.discount }
    pub fn tax(&self) -> &Money { &self.tax }
    pub fn shipping_cost(&self) -> &Money { &self.shipping_cost }
    pub fn total_amount(&self) -> &Money { &self.total_amount }
    pub fn shipping_address(&self) -> &Address { &self.shipping_address }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn version(&self) -> u64 { self.version }

    pub fn confirm(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::Pending, OrderStatus::Confirmed)?;
        self.raise_event(DomainEvent::Order(OrderEvent::Confirmed { order_id: self.id.clone(), total: self.total_amount.amount() }));
        Ok(())
    }

    pub fn authorize_payment(&mut self) -> Result<(), OrderError> {
        if self.payment_status != PaymentStatus::Pending { return Err(self.invalid_payment(PaymentStatus::Authorized)); }
        self.payment_status = PaymentStatus::Authorized;
        self.touch();
        Ok(())
    }

    pub fn mark_paid(&mut self) -> Result<(), OrderError> {
        if !matches!(self.payment_status, PaymentStatus::Pending | PaymentStatus::Authorized) {
            return Err(self.invalid_payment(PaymentStatus::Paid));
        }
        self.payment_status = PaymentStatus::Paid;
        if self.status == OrderStatus::Confirmed { self.status = OrderStatus::Processing; }
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_id: self.id.clone() }));
        Ok(())
    }

    pub fn ship(&mut self, tracking: Option<String>) -> Result<(), OrderError> {
        self.transition(OrderStatus::Processing, OrderStatus::Shipped)?;
        self.raise_event(DomainEvent::Order(OrderEvent::Shipped { order_id: self.id.clone(), tracking }));
        Ok(())
    }

    pub fn deliver(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::Shipped, OrderStatus::Delivered)?;
        self.raise_event(DomainEvent::Order(OrderEvent::Delivered { order_id: self.id.clone() }));
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if matches!(self.status, OrderStatus::Shipped | OrderStatus::Delivered | OrderStatus::Cancelled) {
            return Err(OrderError::InvalidTransition { from: format!("{:?}", self.status), to: "Cancelled".into() });
        }
        self.status = OrderStatus::Cancelled;
        self.payment_status = match self.payment_status {
            PaymentStatus::Paid => PaymentStatus::Refunded,
            PaymentStatus::Pending | PaymentStatus::Authorized => PaymentStatus::Voided,
            other => other,
        };
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id.clone() }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn transition(&mut self, from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
        if self.status != from {
            return Err(OrderError::InvalidTransition { from: format!("{:?}", self.status), to: format!("{to:?}") });
        }
        self.status = to;
        self.touch();
        Ok(())
    }

    fn invalid_payment(&self, to: PaymentStatus) -> OrderError {
        OrderError::InvalidTransition { from: format!("{:?}", self.payment_status), to: format!("{to:?}") }
    }

    pub(crate) fn bump_version(&mut self) { self.version += 1; }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}
