//! Notification and audit sinks.
//!
//! Sinks are fire-and-forget: publishing never blocks the caller and never
//! reports failure back into the order or inventory path.

use std::sync::{Arc, Mutex};

use crate::domain::aggregates::LedgerChange;
use crate::domain::events::{DomainEvent, InventoryEvent};

pub trait AuditSink: Send + Sync {
    fn publish(&self, event: DomainEvent);
}

/// Forwards a ledger change as inventory events.
pub fn publish_ledger_change(sink: &dyn AuditSink, product_id: &str, change: LedgerChange) {
    if let Some(movement) = change.movement {
        sink.publish(DomainEvent::Inventory(InventoryEvent::StockMoved { product_id: product_id.to_string(), movement }));
    }
    for alert in change.raised {
        sink.publish(DomainEvent::Inventory(InventoryEvent::AlertRaised { product_id: product_id.to_string(), alert }));
    }
    for alert in change.resolved {
        let resolved_at = alert.resolved_at.unwrap_or(alert.created_at);
        sink.publish(DomainEvent::Inventory(InventoryEvent::AlertResolved { product_id: product_id.to_string(), alert, resolved_at }));
    }
}

/// Writes every event to the `audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn publish(&self, event: DomainEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => tracing::info!(target: "audit", subject = event.subject(), %payload, "domain event"),
            Err(e) => tracing::warn!(target: "audit", subject = event.subject(), error = %e, "failed to serialize domain event"),
        }
    }
}

/// Publishes JSON events to NATS under `<prefix>.<subject>`.
#[derive(Clone)]
pub struct NatsSink {
    client: async_nats::Client,
    prefix: String,
}

impl NatsSink {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self {
        Self { client, prefix: prefix.into() }
    }
}

impl AuditSink for NatsSink {
    fn publish(&self, event: DomainEvent) {
        let subject = format!("{}.{}", self.prefix, event.subject());
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(%subject, error = %e, "failed to serialize domain event");
                return;
            }
        };
        let client = self.client.clone();
        tokio::spawn(async move {
            if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                tracing::warn!(%subject, error = %e, "failed to publish domain event");
            }
        });
    }
}

/// Keeps events in memory; used by tests to assert on what was published.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn subjects(&self) -> Vec<&'static str> {
        self.events().iter().map(DomainEvent::subject).collect()
    }
}

impl AuditSink for RecordingSink {
    fn publish(&self, event: DomainEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
