//! Checkout: cart to committed order.
//!
//! Each attempt runs `Validating → Reserving → Committing → Cleaning → Done`.
//! Validation re-reads live state, stock is decremented on private copies
//! of the ledgers, and the order, ledgers and cleared cart are handed to the
//! store as a single commit. A concurrent writer turns the commit into a
//! conflict, which re-runs the attempt from validation. Events reach the
//! audit sink only after a commit succeeds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::Principal;
use crate::domain::aggregates::{Address, LedgerChange, Order, PaymentMethod, Product, StockLedger};
use crate::domain::events::DomainEvent;
use crate::domain::services::{assemble, PricingPolicy};
use crate::notify::{publish_ledger_change, AuditSink};
use crate::store::{CheckoutCommit, CommerceStore};
use crate::{CommerceError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckoutState { Validating, Reserving, Committing, Cleaning, Done, Aborted }

impl CheckoutState {
    pub fn can_advance_to(self, next: CheckoutState) -> bool {
        use CheckoutState::*;
        match (self, next) {
            (Validating, Reserving) | (Reserving, Committing) | (Committing, Cleaning) | (Cleaning, Done) => true,
            (Done | Aborted, Aborted) => false,
            (_, Aborted) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutSettings {
    /// Attempts per checkout, counting the first.
    pub max_attempts: u32,
    /// Budget for validating and reserving in one attempt. Exceeding it
    /// abandons the attempt before anything is written.
    pub timeout: Duration,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self { max_attempts: 5, timeout: Duration::from_secs(5) }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: String,
    pub shipping_address: Address,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

struct CheckoutRun<'a> {
    user_id: &'a str,
    attempt: u32,
    state: CheckoutState,
}

impl<'a> CheckoutRun<'a> {
    fn new(user_id: &'a str, attempt: u32) -> Self {
        Self { user_id, attempt, state: CheckoutState::Validating }
    }

    fn advance(&mut self, next: CheckoutState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(CommerceError::inconsistency(format!("illegal checkout transition {:?} -> {next:?}", self.state)));
        }
        tracing::debug!(user_id = self.user_id, attempt = self.attempt, from = ?self.state, to = ?next, "checkout state");
        self.state = next;
        Ok(())
    }

    fn abort(&mut self, error: &CommerceError) {
        if error.is_fatal() {
            tracing::error!(user_id = self.user_id, attempt = self.attempt, state = ?self.state, %error, "checkout aborted");
        } else {
            tracing::warn!(user_id = self.user_id, attempt = self.attempt, state = ?self.state, code = error.code(), %error, "checkout aborted");
        }
        self.state = CheckoutState::Aborted;
    }
}

struct Prepared {
    commit: CheckoutCommit,
    events: Vec<DomainEvent>,
    changes: Vec<(String, LedgerChange)>,
}

struct Committed {
    order: Order,
    events: Vec<DomainEvent>,
    changes: Vec<(String, LedgerChange)>,
}

pub struct CheckoutCoordinator<S> {
    store: Arc<S>,
    sink: Arc<dyn AuditSink>,
    pricing: PricingPolicy,
    settings: CheckoutSettings,
}

impl<S: CommerceStore> CheckoutCoordinator<S> {
    pub fn new(store: Arc<S>, sink: Arc<dyn AuditSink>, pricing: PricingPolicy, settings: CheckoutSettings) -> Self {
        Self { store, sink, pricing, settings }
    }

    pub async fn checkout(&self, principal: &Principal, request: CheckoutRequest) -> Result<Order> {
        if request.user_id.trim().is_empty() {
            return Err(CommerceError::validation("user id is required"));
        }
        if !principal.can_act_for(&request.user_id) {
            return Err(CommerceError::forbidden(format!("{} cannot check out for {}", principal.user_id, request.user_id)));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut run = CheckoutRun::new(&request.user_id, attempt);
            // Only preparation is bounded; a commit that has been issued runs to completion.
            let prepared = tokio::time::timeout(self.settings.timeout, self.prepare(&mut run, principal, &request)).await;
            let (error, timed_out) = match prepared {
                Ok(Ok(prepared)) => match self.commit(&mut run, prepared).await {
                    Ok(committed) => {
                        tracing::info!(
                            order_id = committed.order.id(), order_number = committed.order.order_number(),
                            user_id = %request.user_id, total = %committed.order.total_amount(), attempt, "order placed"
                        );
                        let order = committed.order.clone();
                        self.publish(committed);
                        return Ok(order);
                    }
                    Err(e) => (e, false),
                },
                Ok(Err(e)) => (e, false),
                Err(_) => (CommerceError::conflict("checkout timed out"), true),
            };
            run.abort(&error);
            if error.is_retryable() && !timed_out && attempt < self.settings.max_attempts {
                tokio::time::sleep(Duration::from_millis(5 * u64::from(attempt))).await;
                continue;
            }
            return Err(error);
        }
    }

    /// Validates and reserves against private copies. Nothing is written.
    async fn prepare(&self, run: &mut CheckoutRun<'_>, principal: &Principal, request: &CheckoutRequest) -> Result<Prepared> {
        // Validating
        let mut cart = self
            .store
            .active_cart(&request.user_id)
            .await?
            .ok_or_else(|| CommerceError::not_found(format!("active cart for {}", request.user_id)))?;

        let mut products: HashMap<String, Product> = HashMap::new();
        let mut ledgers: HashMap<String, StockLedger> = HashMap::new();
        for item in cart.items() {
            if products.contains_key(&item.product_id) || ledgers.contains_key(&item.product_id) {
                continue;
            }
            if let Some(product) = self.store.product(&item.product_id).await? {
                products.insert(item.product_id.clone(), product);
            }
            if let Some(ledger) = self.store.ledger(&item.product_id).await? {
                ledgers.insert(item.product_id.clone(), ledger);
            }
        }
        let draft = assemble(&cart, |id| products.get(id), |id| ledgers.get(id), &self.pricing)?;

        // Reserving: decrement private copies; nothing is visible until commit.
        run.advance(CheckoutState::Reserving)?;
        let mut order = Order::place(
            draft, &request.user_id, request.shipping_address.clone(), request.payment_method, request.notes.clone(),
        );
        let mut changes = Vec::with_capacity(order.items().len());
        for item in order.items() {
            let ledger = ledgers
                .get_mut(&item.product_id)
                .ok_or_else(|| CommerceError::inconsistency(format!("no ledger loaded for {}", item.product_id)))?;
            let change = ledger
                .reduce(item.quantity, "order", Some(order.id()), &principal.user_id)
                .map_err(|e| match e {
                    CommerceError::InsufficientStock { product_id, available, requested, .. } => {
                        CommerceError::InsufficientStock { product_id, product: item.name.clone(), available, requested }
                    }
                    other => other,
                })?;
            changes.push((item.product_id.clone(), change));
        }

        run.advance(CheckoutState::Committing)?;
        let events = order.take_events();
        let ledgers: Vec<StockLedger> = ledgers.into_values().collect();

        run.advance(CheckoutState::Cleaning)?;
        cart.clear();
        Ok(Prepared { commit: CheckoutCommit { order, ledgers, cart }, events, changes })
    }

    async fn commit(&self, run: &mut CheckoutRun<'_>, prepared: Prepared) -> Result<Committed> {
        let Prepared { commit, events, changes } = prepared;
        let order = self.store.commit_checkout(commit).await?;
        run.advance(CheckoutState::Done)?;
        Ok(Committed { order, events, changes })
    }

    fn publish(&self, committed: Committed) {
        for event in committed.events {
            self.sink.publish(event);
        }
        for (product_id, change) in committed.changes {
            publish_ledger_change(self.sink.as_ref(), &product_id, change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CheckoutState::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(Validating.can_advance_to(Reserving));
        assert!(Reserving.can_advance_to(Committing));
        assert!(Committing.can_advance_to(Cleaning));
        assert!(Cleaning.can_advance_to(Done));
    }

    #[test]
    fn test_abort_reachable_until_done() {
        for state in [Validating, Reserving, Committing, Cleaning] {
            assert!(state.can_advance_to(Aborted));
        }
        assert!(!Done.can_advance_to(Aborted));
        assert!(!Aborted.can_advance_to(Aborted));
    }

    #[test]
    fn test_no_skipping_states() {
        assert!(!Validating.can_advance_to(Committing));
        assert!(!Reserving.can_advance_to(Done));
        assert!(!Done.can_advance_to(Validating));
    }

    #[test]
    fn test_run_rejects_illegal_advance() {
        let mut run = CheckoutRun::new("u1", 1);
        assert!(matches!(run.advance(Done), Err(CommerceError::InternalInconsistency(_))));
        run.advance(Reserving).unwrap();
        run.abort(&CommerceError::conflict("stale"));
        assert_eq!(run.state, Aborted);
    }
}
