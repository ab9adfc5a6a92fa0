//! Domain events
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::{Alert, Movement};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
    Inventory(InventoryEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: String, user_id: String, total: Decimal },
    Confirmed { order_id: String, total: Decimal },
    Paid { order_id: String },
    Shipped { order_id: String, tracking: Option<String> },
    Delivered { order_id: String },
    Cancelled { order_id: String },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InventoryEvent {
    StockMoved { product_id: String, movement: Movement },
    AlertRaised { product_id: String, alert: Alert },
    AlertResolved { product_id: String, alert: Alert, resolved_at: DateTime<Utc> },
}

impl DomainEvent {
    /// Subject suffix used when forwarding the event to a message bus.
    pub fn subject(&self) -> &'static str {
        match self {
            DomainEvent::Order(OrderEvent::Placed { .. }) => "order.placed",
            DomainEvent::Order(OrderEvent::Confirmed { .. }) => "order.confirmed",
            DomainEvent::Order(OrderEvent::Paid { .. }) => "order.paid",
            DomainEvent::Order(OrderEvent::Shipped { .. }) => "order.shipped",
            DomainEvent::Order(OrderEvent::Delivered { .. }) => "order.delivered",
            DomainEvent::Order(OrderEvent::Cancelled { .. }) => "order.cancelled",
            DomainEvent::Inventory(InventoryEvent::StockMoved { .. }) => "inventory.stock_moved",
            DomainEvent::Inventory(InventoryEvent::AlertRaised { .. }) => "inventory.alert_raised",
            DomainEvent::Inventory(InventoryEvent::AlertResolved { .. }) => "inventory.alert_resolved",
        }
    }
}
