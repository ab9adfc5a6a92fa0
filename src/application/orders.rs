//! Placed orders: lookups and status changes after checkout.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Principal;
use crate::domain::aggregates::Order;
use crate::notify::AuditSink;
use crate::store::OrderStore;
use crate::{CommerceError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction { Confirm, AuthorizePayment, MarkPaid, Ship, Deliver, Cancel }

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct OrderTransition {
    pub action: OrderAction,
    /// Carrier tracking reference; read only by `ship`.
    pub tracking: Option<String>,
}

impl OrderTransition {
    pub fn new(action: OrderAction) -> Self {
        Self { action, tracking: None }
    }

    fn apply(&self, order: &mut Order) -> Result<()> {
        match self.action {
            OrderAction::Confirm => order.confirm()?,
            OrderAction::AuthorizePayment => order.authorize_payment()?,
            OrderAction::MarkPaid => order.mark_paid()?,
            OrderAction::Ship => order.ship(self.tracking.clone())?,
            OrderAction::Deliver => order.deliver()?,
            OrderAction::Cancel => order.cancel()?,
        }
        Ok(())
    }
}

pub struct OrderService<S> {
    store: Arc<S>,
    sink: Arc<dyn AuditSink>,
    max_attempts: u32,
}

impl<S: OrderStore> OrderService<S> {
    pub fn new(store: Arc<S>, sink: Arc<dyn AuditSink>, max_attempts: u32) -> Self {
        Self { store, sink, max_attempts: max_attempts.max(1) }
    }

    /// Looks up a placed order; customers only see their own.
    pub async fn order(&self, principal: &Principal, order_id: &str) -> Result<Order> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or_else(|| CommerceError::not_found(format!("order {order_id}")))?;
        if !principal.can_act_for(order.user_id()) {
            return Err(CommerceError::forbidden(format!("{} cannot view order {order_id}", principal.user_id)));
        }
        Ok(order)
    }

    /// Moves an order along its lifecycle. Staff drive every step; a
    /// customer may only cancel their own order.
    pub async fn transition(&self, principal: &Principal, order_id: &str, transition: OrderTransition) -> Result<Order> {
        if !principal.is_staff() && transition.action != OrderAction::Cancel {
            return Err(CommerceError::forbidden(format!("{} cannot {:?} orders", principal.user_id, transition.action)));
        }
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut order = self.order(principal, order_id).await?;
            let from = order.status();
            transition.apply(&mut order)?;
            let events = order.take_events();
            match self.store.update_order(order).await {
                Ok(saved) => {
                    tracing::info!(
                        order_id, action = ?transition.action, from = ?from, to = ?saved.status(),
                        payment = ?saved.payment_status(), actor = %principal.user_id, "order updated"
                    );
                    for event in events {
                        self.sink.publish(event);
                    }
                    return Ok(saved);
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    tracing::debug!(order_id, attempt, "order update conflicted, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }
}
