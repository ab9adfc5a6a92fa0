//! Staff-facing stock operations and the expiry sweep entry point.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Principal;
use crate::domain::aggregates::{Alert, Batch, BatchInfo, BatchStatus, LedgerChange, StockLedger};
use crate::notify::{publish_ledger_change, AuditSink};
use crate::store::InventoryStore;
use crate::{CommerceError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockAction { Add, Reduce, Set }

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct StockAdjustment {
    pub action: StockAction,
    pub quantity: u32,
    pub reason: Option<String>,
    pub batch: Option<BatchInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StockSnapshot {
    pub product_id: String,
    pub current: u32,
    pub reserved: u32,
    pub available: u32,
    /// Available units outside expired or recalled batches.
    pub sellable: u32,
    pub reorder_level: u32,
    pub max_stock: u32,
    pub batches: Vec<Batch>,
    pub active_alerts: Vec<Alert>,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl From<&StockLedger> for StockSnapshot {
    fn from(ledger: &StockLedger) -> Self {
        let stock = ledger.stock();
        Self {
            product_id: ledger.product_id().to_string(),
            current: stock.current,
            reserved: stock.reserved,
            available: stock.available(),
            sellable: ledger.sellable(),
            reorder_level: stock.reorder_level,
            max_stock: stock.max_stock,
            batches: ledger.batches().to_vec(),
            active_alerts: ledger.active_alerts().cloned().collect(),
            version: ledger.version(),
            updated_at: ledger.updated_at(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExpirySweepReport {
    pub ledgers_checked: usize,
    pub expired_batches: usize,
    pub near_expiry_batches: usize,
    pub alerts_raised: usize,
    pub alerts_resolved: usize,
    /// Ledgers skipped because a concurrent write won; the next sweep retries them.
    pub conflicts: usize,
}

pub struct InventoryService<S> {
    store: Arc<S>,
    sink: Arc<dyn AuditSink>,
    max_attempts: u32,
}

impl<S: InventoryStore> InventoryService<S> {
    pub fn new(store: Arc<S>, sink: Arc<dyn AuditSink>, max_attempts: u32) -> Self {
        Self { store, sink, max_attempts: max_attempts.max(1) }
    }

    pub async fn snapshot(&self, principal: &Principal, product_id: &str) -> Result<StockSnapshot> {
        require_staff(principal)?;
        let ledger = self.load(product_id).await?;
        Ok(StockSnapshot::from(&ledger))
    }

    pub async fn adjust_stock(&self, principal: &Principal, product_id: &str, adjustment: StockAdjustment) -> Result<StockSnapshot> {
        require_staff(principal)?;
        let actor = principal.user_id.as_str();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut ledger = self.load(product_id).await?;
            let change = apply(&mut ledger, &adjustment, actor)?;
            match self.store.save_ledger(ledger).await {
                Ok(saved) => {
                    tracing::info!(product_id, action = ?adjustment.action, quantity = adjustment.quantity, actor, current = saved.stock().current, "stock adjusted");
                    publish_ledger_change(self.sink.as_ref(), product_id, change);
                    return Ok(StockSnapshot::from(&saved));
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    tracing::debug!(product_id, attempt, "stock adjustment conflicted, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Re-evaluates batch expiry across every ledger as of `now` and persists
    /// the resulting batch status and alert changes.
    pub async fn sweep_expiry(&self, principal: &Principal, now: DateTime<Utc>) -> Result<ExpirySweepReport> {
        require_staff(principal)?;
        let mut report = ExpirySweepReport::default();
        for mut ledger in self.store.ledgers().await? {
            report.ledgers_checked += 1;
            report.expired_batches += ledger.check_expired_batches(now).len();
            report.near_expiry_batches += ledger.check_near_expiry_batches(now, ledger.near_expiry_days()).len();

            let statuses: Vec<BatchStatus> = ledger.batches().iter().map(|b| b.status).collect();
            let change = ledger.check_alerts_at(now);
            let statuses_changed = ledger.batches().iter().map(|b| b.status).ne(statuses.into_iter());
            if change.raised.is_empty() && change.resolved.is_empty() && !statuses_changed {
                continue;
            }

            let product_id = ledger.product_id().to_string();
            match self.store.save_ledger(ledger).await {
                Ok(_) => {
                    report.alerts_raised += change.raised.len();
                    report.alerts_resolved += change.resolved.len();
                    publish_ledger_change(self.sink.as_ref(), &product_id, change);
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(%product_id, "expiry sweep lost a write race, skipping ledger");
                    report.conflicts += 1;
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!(?report, "expiry sweep finished");
        Ok(report)
    }

    async fn load(&self, product_id: &str) -> Result<StockLedger> {
        self.store
            .ledger(product_id)
            .await?
            .ok_or_else(|| CommerceError::not_found(format!("stock ledger {product_id}")))
    }
}

fn require_staff(principal: &Principal) -> Result<()> {
    if !principal.is_staff() {
        return Err(CommerceError::forbidden(format!("{} cannot manage inventory", principal.user_id)));
    }
    Ok(())
}

fn apply(ledger: &mut StockLedger, adjustment: &StockAdjustment, actor: &str) -> Result<LedgerChange> {
    let reason = adjustment.reason.as_deref().unwrap_or("manual adjustment");
    match adjustment.action {
        StockAction::Add => ledger.add(adjustment.quantity, adjustment.batch.clone(), actor),
        StockAction::Reduce => ledger.reduce(adjustment.quantity, reason, None, actor),
        StockAction::Set => ledger.set(adjustment.quantity, reason, actor, adjustment.batch.clone()),
    }
}
