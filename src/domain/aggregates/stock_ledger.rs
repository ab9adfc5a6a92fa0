//! StockLedger Aggregate
//!
//! One ledger per product. Stock lives in expiring batches; `stock.current`
//! always equals the sum of batch quantities and `stock.reserved` never
//! exceeds it. Every operation checks those invariants before it mutates,
//! applies its change all-or-nothing, appends to the movement log and
//! re-evaluates alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::services::{alert_monitor, reservation};
use crate::domain::value_objects::Money;
use crate::{CommerceError, Result};

pub const DEFAULT_NEAR_EXPIRY_DAYS: u32 = 30;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StockLedger {
    product_id: String,
    stock: StockLevels,
    batches: Vec<Batch>,
    movements: Vec<Movement>,
    alerts: Vec<Alert>,
    sales: SalesStats,
    near_expiry_days: u32,
    version: u64,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    pub current: u32,
    pub reserved: u32,
    pub reorder_level: u32,
    pub max_stock: u32,
}

impl StockLevels {
    pub fn available(&self) -> u32 { self.current.saturating_sub(self.reserved) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_number: String,
    pub quantity: u32,
    pub expiry_date: Option<DateTime<Utc>>,
    pub manufacture_date: Option<DateTime<Utc>>,
    pub cost_price: Option<Money>,
    pub status: BatchStatus,
    pub received_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus { #[default] Fresh, NearExpiry, Expired, Recalled }

/// Incoming batch description for stock receipts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInfo {
    pub batch_number: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub manufacture_date: Option<DateTime<Utc>>,
    pub cost_price: Option<Money>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType { In, Out, Adjustment, Return, Damaged, Expired }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDraw {
    pub batch_number: String,
    pub quantity: u32,
}

/// Immutable audit record of one stock change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub kind: MovementType,
    pub quantity: u32,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub balance_after: u32,
    pub batches: Vec<BatchDraw>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType { LowStock, OutOfStock, Overstock, NearExpiry, Expired }

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity { Low, Medium, High }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn raise(kind: AlertType, severity: AlertSeverity, message: String, now: DateTime<Utc>) -> Self {
        Self { id: Uuid::now_v7().to_string(), kind, severity, message, is_active: true, created_at: now, resolved_at: None }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesStats {
    pub total_sold: u64,
    pub last_sold_at: Option<DateTime<Utc>>,
}

/// What a ledger operation changed, for the audit sink.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerChange {
    pub movement: Option<Movement>,
    pub raised: Vec<Alert>,
    pub resolved: Vec<Alert>,
}

impl StockLedger {
    pub fn new(product_id: impl Into<String>, reorder_level: u32, max_stock: u32) -> Self {
        Self {
            product_id: product_id.into(),
            stock: StockLevels { current: 0, reserved: 0, reorder_level, max_stock },
            batches: vec![], movements: vec![], alerts: vec![],
            sales: SalesStats::default(),
            near_expiry_days: DEFAULT_NEAR_EXPIRY_DAYS,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn with_near_expiry_days(mut self, days: u32) -> Self { self.near_expiry_days = days; self }

    pub fn product_id(&self) -> &str { &self.product_id }
    pub fn stock(&self) -> &StockLevels { &self.stock }
    pub fn available(&self) -> u32 { self.stock.available() }
    /// Unreserved units a sale can draw on now.
    pub fn sellable(&self) -> u32 { self.sellable_at(Utc::now()) }
    /// Reservations are held against sellable stock.
    pub fn sellable_at(&self, now: DateTime<Utc>) -> u32 {
        reservation::sellable_quantity(&self.batches, now).saturating_sub(self.stock.reserved)
    }
    pub fn batches(&self) -> &[Batch] { &self.batches }
    pub fn movements(&self) -> &[Movement] { &self.movements }
    pub fn alerts(&self) -> &[Alert] { &self.alerts }
    pub fn active_alerts(&self) -> impl Iterator<Item = &Alert> { self.alerts.iter().filter(|a| a.is_active) }
    pub fn sales(&self) -> &SalesStats { &self.sales }
    pub fn near_expiry_days(&self) -> u32 { self.near_expiry_days }
    pub fn version(&self) -> u64 { self.version }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Sells `quantity` units through FIFO depletion of sellable batches.
    pub fn reduce(&mut self, quantity: u32, reason: &str, reference: Option<&str>, actor: &str) -> Result<LedgerChange> {
        self.ensure_positive(quantity)?;
        self.verify()?;
        let now = Utc::now();
        self.ensure_sellable(quantity, now)?;
        let draws = reservation::sell(&mut self.batches, quantity, now).map_err(|s| self.shortfall(s))?;
        self.stock.current -= quantity;
        self.sales.total_sold += u64::from(quantity);
        self.sales.last_sold_at = Some(now);
        Ok(self.record(MovementType::Out, quantity, Some(reason), reference, actor, draws, now))
    }

    /// Receives a new batch.
    pub fn add(&mut self, quantity: u32, batch: Option<BatchInfo>, actor: &str) -> Result<LedgerChange> {
        self.receive(MovementType::In, quantity, batch, None, None, actor)
    }

    /// Puts returned units back on the shelf as their own batch.
    pub fn record_return(&mut self, quantity: u32, batch: Option<BatchInfo>, reference: &str, actor: &str) -> Result<LedgerChange> {
        self.receive(MovementType::Return, quantity, batch, Some("customer return"), Some(reference), actor)
    }

    pub fn reserve(&mut self, quantity: u32, reference: &str, actor: &str) -> Result<LedgerChange> {
        self.ensure_positive(quantity)?;
        self.verify()?;
        self.ensure_sellable(quantity, Utc::now())?;
        self.stock.reserved += quantity;
        tracing::debug!(product_id = %self.product_id, quantity, reference, actor, "stock reserved");
        Ok(self.finish(Utc::now()))
    }

    /// Releases a reservation; never drops `reserved` below zero.
    pub fn release(&mut self, quantity: u32, reference: &str, actor: &str) -> Result<LedgerChange> {
        self.ensure_positive(quantity)?;
        self.verify()?;
        if quantity > self.stock.reserved {
            tracing::warn!(product_id = %self.product_id, quantity, reserved = self.stock.reserved, reference, "release exceeds reservation, clamping");
        }
        self.stock.reserved = self.stock.reserved.saturating_sub(quantity);
        tracing::debug!(product_id = %self.product_id, quantity, reference, actor, "stock released");
        Ok(self.finish(Utc::now()))
    }

    /// Admin adjustment to an absolute level.
    pub fn set(&mut self, target: u32, reason: &str, actor: &str, batch: Option<BatchInfo>) -> Result<LedgerChange> {
        self.verify()?;
        if target < self.stock.reserved {
            return Err(CommerceError::validation(format!("cannot set stock to {target}: {} units are reserved", self.stock.reserved)));
        }
        let now = Utc::now();
        let current = self.stock.current;
        if target == current {
            return Ok(self.finish(now));
        }
        if target > current {
            let batch = self.new_batch(target - current, batch.unwrap_or_default(), now)?;
            let draw = BatchDraw { batch_number: batch.batch_number.clone(), quantity: batch.quantity };
            self.insert_batch(batch);
            self.stock.current = target;
            return Ok(self.record(MovementType::Adjustment, target - current, Some(reason), None, actor, vec![draw], now));
        }
        let draws = self.deplete(current - target)?;
        Ok(self.record(MovementType::Adjustment, current - target, Some(reason), None, actor, draws, now))
    }

    pub fn write_off_damaged(&mut self, quantity: u32, reason: &str, actor: &str) -> Result<LedgerChange> {
        self.ensure_positive(quantity)?;
        self.verify()?;
        self.ensure_available(quantity)?;
        let now = Utc::now();
        let draws = self.deplete(quantity)?;
        Ok(self.record(MovementType::Damaged, quantity, Some(reason), None, actor, draws, now))
    }

    /// Removes every unit held in batches expired as of `now`.
    pub fn write_off_expired(&mut self, now: DateTime<Utc>, actor: &str) -> Result<LedgerChange> {
        self.verify()?;
        let quantity: u32 = alert_monitor::expired_batches(&self.batches, now).iter().map(|b| b.quantity).sum();
        if quantity == 0 {
            return Ok(self.finish(now));
        }
        self.ensure_available(quantity)?;
        let mut draws = Vec::new();
        for batch in self.batches.iter_mut().filter(|b| b.quantity > 0 && b.expiry_date.is_some_and(|exp| exp <= now)) {
            draws.push(BatchDraw { batch_number: batch.batch_number.clone(), quantity: batch.quantity });
            batch.quantity = 0;
        }
        self.stock.current -= quantity;
        Ok(self.record(MovementType::Expired, quantity, Some("expired batch write-off"), None, actor, draws, now))
    }

    pub fn recall_batch(&mut self, batch_number: &str, actor: &str) -> Result<LedgerChange> {
        let batch = self
            .batches
            .iter_mut()
            .find(|b| b.batch_number == batch_number)
            .ok_or_else(|| CommerceError::not_found(format!("batch {batch_number}")))?;
        batch.status = BatchStatus::Recalled;
        tracing::warn!(product_id = %self.product_id, batch_number, actor, "batch recalled");
        Ok(self.finish(Utc::now()))
    }

    /// Re-evaluates alerts against the current state.
    pub fn check_alerts(&mut self) -> LedgerChange { self.check_alerts_at(Utc::now()) }

    pub fn check_alerts_at(&mut self, now: DateTime<Utc>) -> LedgerChange {
        for batch in &mut self.batches {
            batch.status = alert_monitor::batch_status(batch, now, self.near_expiry_days);
        }
        let conditions = alert_monitor::evaluate(self, now);
        let (raised, resolved) = alert_monitor::reconcile(&mut self.alerts, conditions, now);
        for alert in &raised {
            tracing::info!(product_id = %self.product_id, kind = ?alert.kind, severity = ?alert.severity, "stock alert raised");
        }
        LedgerChange { movement: None, raised, resolved }
    }

    pub fn check_expired_batches(&self, now: DateTime<Utc>) -> Vec<&Batch> {
        alert_monitor::expired_batches(&self.batches, now)
    }

    pub fn check_near_expiry_batches(&self, now: DateTime<Utc>, days: u32) -> Vec<&Batch> {
        alert_monitor::near_expiry_batches(&self.batches, now, days)
    }

    /// Checks the structural invariants. Violations are ledger corruption.
    pub fn verify(&self) -> Result<()> {
        let batch_total: u64 = self.batches.iter().map(|b| u64::from(b.quantity)).sum();
        if batch_total != u64::from(self.stock.current) {
            tracing::error!(product_id = %self.product_id, batch_total, current = self.stock.current, "batch total drifted from current stock");
            return Err(CommerceError::inconsistency(format!(
                "ledger {}: batches hold {batch_total} units but current stock is {}", self.product_id, self.stock.current
            )));
        }
        if self.stock.reserved > self.stock.current {
            tracing::error!(product_id = %self.product_id, reserved = self.stock.reserved, current = self.stock.current, "reservation exceeds stock");
            return Err(CommerceError::inconsistency(format!(
                "ledger {}: reserved {} exceeds current {}", self.product_id, self.stock.reserved, self.stock.current
            )));
        }
        Ok(())
    }

    pub(crate) fn bump_version(&mut self) { self.version += 1; }

    fn receive(&mut self, kind: MovementType, quantity: u32, batch: Option<BatchInfo>, reason: Option<&str>, reference: Option<&str>, actor: &str) -> Result<LedgerChange> {
        self.ensure_positive(quantity)?;
        self.verify()?;
        let current = self.stock.current.checked_add(quantity)
            .ok_or_else(|| CommerceError::validation("stock quantity overflow"))?;
        let now = Utc::now();
        let batch = self.new_batch(quantity, batch.unwrap_or_default(), now)?;
        let draw = BatchDraw { batch_number: batch.batch_number.clone(), quantity };
        self.insert_batch(batch);
        self.stock.current = current;
        Ok(self.record(kind, quantity, reason, reference, actor, vec![draw], now))
    }

    fn new_batch(&self, quantity: u32, info: BatchInfo, now: DateTime<Utc>) -> Result<Batch> {
        if let (Some(made), Some(exp)) = (info.manufacture_date, info.expiry_date) {
            if made > exp {
                return Err(CommerceError::validation("manufacture date is after expiry date"));
            }
        }
        let batch_number = match info.batch_number {
            Some(n) if n.trim().is_empty() => return Err(CommerceError::validation("batch number cannot be blank")),
            Some(n) => n,
            None => format!("B-{}-{}", now.format("%Y%m%d"), self.batches.len() + 1),
        };
        if self.batches.iter().any(|b| b.batch_number == batch_number) {
            return Err(CommerceError::validation(format!("batch {batch_number} already exists")));
        }
        Ok(Batch {
            batch_number,
            quantity,
            expiry_date: info.expiry_date,
            manufacture_date: info.manufacture_date,
            cost_price: info.cost_price,
            status: BatchStatus::Fresh,
            received_at: now,
        })
    }

    /// Keeps `batches` sorted by expiry; a new batch goes after equal keys.
    fn insert_batch(&mut self, batch: Batch) {
        let key = (batch.expiry_date.is_none(), batch.expiry_date);
        let pos = self.batches.partition_point(|b| (b.expiry_date.is_none(), b.expiry_date) <= key);
        self.batches.insert(pos, batch);
    }

    fn deplete(&mut self, quantity: u32) -> Result<Vec<BatchDraw>> {
        let draws = reservation::deplete(&mut self.batches, quantity).map_err(|s| self.shortfall(s))?;
        self.stock.current -= quantity;
        Ok(draws)
    }

    /// A plan that fails after its stock check means the batches disagree with the totals.
    fn shortfall(&self, shortfall: reservation::Shortfall) -> CommerceError {
        tracing::error!(product_id = %self.product_id, requested = shortfall.requested, missing = shortfall.missing, "FIFO depletion shortfall");
        CommerceError::inconsistency(format!(
            "ledger {}: batches short by {} of {} units", self.product_id, shortfall.missing, shortfall.requested
        ))
    }

    fn ensure_positive(&self, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(CommerceError::validation("quantity must be positive"));
        }
        Ok(())
    }

    fn ensure_available(&self, quantity: u32) -> Result<()> {
        self.ensure_at_most(quantity, self.stock.available())
    }

    fn ensure_sellable(&self, quantity: u32, now: DateTime<Utc>) -> Result<()> {
        self.ensure_at_most(quantity, self.sellable_at(now))
    }

    fn ensure_at_most(&self, quantity: u32, available: u32) -> Result<()> {
        if available < quantity {
            return Err(CommerceError::InsufficientStock {
                product_id: self.product_id.clone(), product: self.product_id.clone(), available, requested: quantity,
            });
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn record(&mut self, kind: MovementType, quantity: u32, reason: Option<&str>, reference: Option<&str>, actor: &str, batches: Vec<BatchDraw>, now: DateTime<Utc>) -> LedgerChange {
        let movement = Movement {
            kind, quantity,
            reason: reason.map(str::to_string),
            reference: reference.map(str::to_string),
            actor: actor.to_string(),
            timestamp: now,
            balance_after: self.stock.current,
            batches,
        };
        self.movements.push(movement.clone());
        let mut change = self.finish(now);
        change.movement = Some(movement);
        change
    }

    fn finish(&mut self, now: DateTime<Utc>) -> LedgerChange {
        self.updated_at = now;
        self.check_alerts_at(now)
    }
}
