//! FIFO batch depletion.
//!
//! Batches are consumed in ascending expiry order; batches without an expiry
//! date come last, and equal keys keep their insertion order. Depletion is
//! planned against an immutable view first and applied only when the plan
//! covers the full quantity, so a batch set is never partially drained.
//!
//! Sales draw only from sellable batches: recalled batches and batches past
//! their expiry date stay on the books until they are written off.

use chrono::{DateTime, Utc};

use crate::domain::aggregates::{Batch, BatchDraw, BatchStatus};

/// Units the batch set could not supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub requested: u32,
    pub missing: u32,
}

/// Ordered `(batch index, quantity)` pairs to take.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepletionPlan {
    steps: Vec<(usize, u32)>,
}

impl DepletionPlan {
    pub fn total(&self) -> u32 { self.steps.iter().map(|(_, q)| q).sum() }
    pub fn steps(&self) -> &[(usize, u32)] { &self.steps }
}

/// Indices of `batches` in consumption order.
pub fn consumption_order(batches: &[Batch]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..batches.len()).collect();
    order.sort_by_key(|&i| (batches[i].expiry_date.is_none(), batches[i].expiry_date));
    order
}

pub fn is_sellable(batch: &Batch, now: DateTime<Utc>) -> bool {
    batch.status != BatchStatus::Recalled && !batch.expiry_date.is_some_and(|exp| exp <= now)
}

/// Units held in sellable batches as of `now`.
pub fn sellable_quantity(batches: &[Batch], now: DateTime<Utc>) -> u32 {
    batches.iter().filter(|b| is_sellable(b, now)).map(|b| b.quantity).sum()
}

/// Plans a removal across every batch, sellable or not.
pub fn plan_depletion(batches: &[Batch], quantity: u32) -> Result<DepletionPlan, Shortfall> {
    plan(batches, quantity, |_| true)
}

/// Plans a sale, skipping expired and recalled batches.
pub fn plan_sale(batches: &[Batch], quantity: u32, now: DateTime<Utc>) -> Result<DepletionPlan, Shortfall> {
    plan(batches, quantity, |b| is_sellable(b, now))
}

fn plan(batches: &[Batch], quantity: u32, eligible: impl Fn(&Batch) -> bool) -> Result<DepletionPlan, Shortfall> {
    let mut remaining = quantity;
    let mut steps = Vec::new();
    for i in consumption_order(batches) {
        if remaining == 0 { break; }
        let batch = &batches[i];
        if batch.quantity == 0 || !eligible(batch) { continue; }
        let take = batch.quantity.min(remaining);
        steps.push((i, take));
        remaining -= take;
    }
    if remaining > 0 {
        return Err(Shortfall { requested: quantity, missing: remaining });
    }
    Ok(DepletionPlan { steps })
}

/// Applies a plan produced by [`plan_depletion`] over the same batches.
fn apply(batches: &mut [Batch], plan: &DepletionPlan) -> Vec<BatchDraw> {
    plan.steps
        .iter()
        .map(|&(i, take)| {
            let batch = &mut batches[i];
            batch.quantity -= take;
            BatchDraw { batch_number: batch.batch_number.clone(), quantity: take }
        })
        .collect()
}

/// Removes exactly `quantity` units or nothing.
pub fn deplete(batches: &mut [Batch], quantity: u32) -> Result<Vec<BatchDraw>, Shortfall> {
    let plan = plan_depletion(batches, quantity)?;
    Ok(apply(batches, &plan))
}

/// Sells exactly `quantity` units from sellable batches or nothing.
pub fn sell(batches: &mut [Batch], quantity: u32, now: DateTime<Utc>) -> Result<Vec<BatchDraw>, Shortfall> {
    let plan = plan_sale(batches, quantity, now)?;
    Ok(apply(batches, &plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn batch(number: &str, quantity: u32, expires_in_days: Option<i64>) -> Batch {
        let now = Utc::now();
        Batch {
            batch_number: number.into(),
            quantity,
            expiry_date: expires_in_days.map(|d| now + Duration::days(d)),
            manufacture_date: None,
            cost_price: None,
            status: BatchStatus::Fresh,
            received_at: now,
        }
    }

    #[test]
    fn test_fifo_exhausts_earliest_batch_first() {
        let mut batches = vec![batch("B1", 5, Some(10)), batch("B2", 5, Some(20))];
        let draws = deplete(&mut batches, 7).unwrap();
        assert_eq!(batches[0].quantity, 0);
        assert_eq!(batches[1].quantity, 3);
        assert_eq!(draws, vec![
            BatchDraw { batch_number: "B1".into(), quantity: 5 },
            BatchDraw { batch_number: "B2".into(), quantity: 2 },
        ]);
    }

    #[test]
    fn test_expiry_order_not_insertion_order() {
        let mut batches = vec![batch("LATE", 4, Some(60)), batch("SOON", 4, Some(3))];
        deplete(&mut batches, 3).unwrap();
        assert_eq!(batches[0].quantity, 4);
        assert_eq!(batches[1].quantity, 1);
    }

    #[test]
    fn test_ties_keep_insertion_order_and_undated_last() {
        let mut batches = vec![batch("NODATE", 5, None), batch("A", 2, Some(5)), batch("B", 2, Some(5))];
        let order = consumption_order(&batches);
        assert_eq!(order, vec![1, 2, 0]);
        deplete(&mut batches, 3).unwrap();
        assert_eq!((batches[1].quantity, batches[2].quantity, batches[0].quantity), (0, 1, 5));
    }

    #[test]
    fn test_shortfall_leaves_batches_untouched() {
        let mut batches = vec![batch("B1", 2, Some(1)), batch("B2", 1, Some(2))];
        let err = deplete(&mut batches, 5).unwrap_err();
        assert_eq!(err, Shortfall { requested: 5, missing: 2 });
        assert_eq!(batches.iter().map(|b| b.quantity).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn test_skips_empty_batches() {
        let batches = vec![batch("EMPTY", 0, Some(1)), batch("B2", 3, Some(2))];
        let plan = plan_depletion(&batches, 2).unwrap();
        assert_eq!(plan.steps(), &[(1, 2)]);
        assert_eq!(plan.total(), 2);
    }

    #[test]
    fn test_sale_skips_expired_and_recalled_batches() {
        let mut recalled = batch("NEW", 4, Some(90));
        recalled.status = BatchStatus::Recalled;
        let mut batches = vec![batch("OLD", 3, Some(-1)), recalled, batch("GOOD", 2, Some(30))];
        let now = Utc::now();
        assert_eq!(sellable_quantity(&batches, now), 2);

        let err = sell(&mut batches, 5, now).unwrap_err();
        assert_eq!(err, Shortfall { requested: 5, missing: 3 });
        assert_eq!(batches.iter().map(|b| b.quantity).collect::<Vec<_>>(), vec![3, 4, 2]);

        let draws = sell(&mut batches, 2, now).unwrap();
        assert_eq!(draws, vec![BatchDraw { batch_number: "GOOD".into(), quantity: 2 }]);
        // Write-offs and adjustments still reach every batch.
        assert_eq!(plan_depletion(&batches, 7).unwrap().total(), 7);
    }
}
