//! Stock alert evaluation.
//!
//! A pure post-condition check over a ledger: `evaluate` maps current state to
//! the set of conditions that should be alerting, `reconcile` brings the
//! ledger's alert list in line with it without duplicating active alerts.

use chrono::{DateTime, Duration, Utc};

use crate::domain::aggregates::{Alert, AlertSeverity, AlertType, Batch, BatchStatus, StockLedger};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertCondition {
    pub kind: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
}

pub fn batch_status(batch: &Batch, now: DateTime<Utc>, near_expiry_days: u32) -> BatchStatus {
    if batch.status == BatchStatus::Recalled {
        return BatchStatus::Recalled;
    }
    match batch.expiry_date {
        Some(exp) if exp <= now => BatchStatus::Expired,
        Some(exp) if exp <= now + Duration::days(i64::from(near_expiry_days)) => BatchStatus::NearExpiry,
        _ => BatchStatus::Fresh,
    }
}

pub fn expired_batches(batches: &[Batch], now: DateTime<Utc>) -> Vec<&Batch> {
    batches
        .iter()
        .filter(|b| b.quantity > 0 && b.expiry_date.is_some_and(|exp| exp <= now))
        .collect()
}

pub fn near_expiry_batches(batches: &[Batch], now: DateTime<Utc>, days: u32) -> Vec<&Batch> {
    let horizon = now + Duration::days(i64::from(days));
    batches
        .iter()
        .filter(|b| b.quantity > 0 && b.expiry_date.is_some_and(|exp| exp > now && exp <= horizon))
        .collect()
}

pub fn evaluate(ledger: &StockLedger, now: DateTime<Utc>) -> Vec<AlertCondition> {
    let mut conditions = Vec::new();
    let stock = ledger.stock();
    let available = stock.available();

    if available == 0 {
        conditions.push(AlertCondition {
            kind: AlertType::OutOfStock,
            severity: AlertSeverity::High,
            message: format!("{} is out of stock", ledger.product_id()),
        });
    } else if available <= stock.reorder_level {
        conditions.push(AlertCondition {
            kind: AlertType::LowStock,
            severity: AlertSeverity::Medium,
            message: format!("{} is low on stock: {} available, reorder level {}", ledger.product_id(), available, stock.reorder_level),
        });
    }

    if stock.max_stock > 0 && stock.current > stock.max_stock {
        conditions.push(AlertCondition {
            kind: AlertType::Overstock,
            severity: AlertSeverity::Low,
            message: format!("{} holds {} units, above max stock {}", ledger.product_id(), stock.current, stock.max_stock),
        });
    }

    let expired = expired_batches(ledger.batches(), now);
    if !expired.is_empty() {
        let units: u32 = expired.iter().map(|b| b.quantity).sum();
        conditions.push(AlertCondition {
            kind: AlertType::Expired,
            severity: AlertSeverity::High,
            message: format!("{} expired batch(es) holding {} units: {}", expired.len(), units, batch_numbers(&expired)),
        });
    }

    let near = near_expiry_batches(ledger.batches(), now, ledger.near_expiry_days());
    if !near.is_empty() {
        conditions.push(AlertCondition {
            kind: AlertType::NearExpiry,
            severity: AlertSeverity::Medium,
            message: format!("{} batch(es) expire within {} days: {}", near.len(), ledger.near_expiry_days(), batch_numbers(&near)),
        });
    }

    conditions
}

/// Raises alerts for new conditions and resolves active alerts whose
/// condition cleared. Returns `(raised, resolved)`.
pub fn reconcile(alerts: &mut Vec<Alert>, conditions: Vec<AlertCondition>, now: DateTime<Utc>) -> (Vec<Alert>, Vec<Alert>) {
    let mut resolved = Vec::new();
    for alert in alerts.iter_mut().filter(|a| a.is_active) {
        if !conditions.iter().any(|c| c.kind == alert.kind) {
            alert.is_active = false;
            alert.resolved_at = Some(now);
            resolved.push(alert.clone());
        }
    }

    let mut raised = Vec::new();
    for condition in conditions {
        if alerts.iter().any(|a| a.is_active && a.kind == condition.kind) {
            continue;
        }
        let alert = Alert::raise(condition.kind, condition.severity, condition.message, now);
        alerts.push(alert.clone());
        raised.push(alert);
    }

    (raised, resolved)
}

fn batch_numbers(batches: &[&Batch]) -> String {
    batches.iter().map(|b| b.batch_number.as_str()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_is_idempotent() {
        let now = Utc::now();
        let condition = AlertCondition { kind: AlertType::LowStock, severity: AlertSeverity::Medium, message: "low".into() };
        let mut alerts = Vec::new();
        let (raised, _) = reconcile(&mut alerts, vec![condition.clone()], now);
        assert_eq!(raised.len(), 1);
        let (raised, resolved) = reconcile(&mut alerts, vec![condition], now);
        assert!(raised.is_empty() && resolved.is_empty());
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn test_reconcile_resolves_cleared_condition() {
        let now = Utc::now();
        let mut alerts = Vec::new();
        reconcile(&mut alerts, vec![AlertCondition { kind: AlertType::LowStock, severity: AlertSeverity::Medium, message: "low".into() }], now);
        let (_, resolved) = reconcile(&mut alerts, vec![], now);
        assert_eq!(resolved.len(), 1);
        assert!(!alerts[0].is_active);
        assert_eq!(alerts[0].resolved_at, Some(now));
    }
}
