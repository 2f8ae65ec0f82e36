//! Stock state and the adjustment planning rules.
//!
//! Planning is pure: given the quantity a caller read, decide what the
//! commit must write. The store enforces atomicity and the version check;
//! the invariant `quantity == sum(deltas) >= 0` holds because every path to
//! a commit goes through these functions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rxstock_core::{ActorId, DomainError, DomainResult, ItemId, LogEntryId, ReasonCode};

/// The one authoritative quantity for an item, with its concurrency token.
///
/// Created lazily: an item without a record reads as `empty()` (quantity 0,
/// version 0), and the first committed adjustment materializes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub item_id: ItemId,
    pub quantity: i64,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl StockLevel {
    pub fn empty(item_id: ItemId) -> Self {
        Self {
            item_id,
            quantity: 0,
            version: 0,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// Immutable audit record: one per committed adjustment, written in the same
/// atomic commit as the stock mutation. The log is the source of truth for
/// stock history and for consumption figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: LogEntryId,
    pub item_id: ItemId,
    pub delta: i64,
    pub reason: ReasonCode,
    pub note: Option<String>,
    pub actor_id: ActorId,
    pub recorded_at: DateTime<Utc>,
}

impl LogEntry {
    pub fn record(
        item_id: ItemId,
        delta: i64,
        reason: ReasonCode,
        note: Option<String>,
        actor_id: ActorId,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LogEntryId::new(),
            item_id,
            delta,
            reason,
            note,
            actor_id,
            recorded_at,
        }
    }
}

/// Decide the new quantity for a signed adjustment.
///
/// Zero deltas are meaningless here and rejected; reconciliation goes
/// through `plan_set_quantity`, which is the one legitimate no-op path.
pub fn plan_adjustment(current: i64, delta: i64) -> DomainResult<i64> {
    if delta == 0 {
        return Err(DomainError::validation("delta cannot be zero"));
    }
    let new_quantity = current
        .checked_add(delta)
        .ok_or_else(|| DomainError::validation("delta out of range"))?;
    if new_quantity < 0 {
        return Err(DomainError::insufficient_stock(current, delta));
    }
    Ok(new_quantity)
}

/// Delta and auto-generated note for an absolute correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetPlan {
    pub delta: i64,
    pub note: String,
}

/// Decide the correction needed to reach `target`.
///
/// Returns `None` when the count already matches: nothing to record, no log
/// entry, no write.
pub fn plan_set_quantity(current: i64, target: i64) -> DomainResult<Option<SetPlan>> {
    if target < 0 {
        return Err(DomainError::validation(format!(
            "target quantity cannot be negative: {target}"
        )));
    }
    let delta = target - current;
    if delta == 0 {
        return Ok(None);
    }
    Ok(Some(SetPlan {
        delta,
        note: format!("stock corrected: {current} -> {target}"),
    }))
}

/// Decide the full write-off delta for a disposal.
///
/// Disposing with nothing on hand is a caller error; plain deactivation
/// covers that case.
pub fn plan_disposal(current: i64) -> DomainResult<i64> {
    if current <= 0 {
        return Err(DomainError::validation(
            "cannot dispose an item with no stock; deactivate it instead",
        ));
    }
    Ok(-current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn adjustment_applies_signed_delta() {
        assert_eq!(plan_adjustment(10, 5).unwrap(), 15);
        assert_eq!(plan_adjustment(10, -10).unwrap(), 0);
        // Lazy stock creation: a missing record reads as 0.
        assert_eq!(plan_adjustment(0, 25).unwrap(), 25);
    }

    #[test]
    fn adjustment_rejects_zero_delta() {
        let err = plan_adjustment(10, 0).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn adjustment_reports_shortfall_with_context() {
        let err = plan_adjustment(3, -5).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                current: 3,
                attempted: -5
            }
        );
    }

    #[test]
    fn set_quantity_no_ops_when_count_matches() {
        assert_eq!(plan_set_quantity(42, 42).unwrap(), None);
    }

    #[test]
    fn set_quantity_plans_signed_correction_with_note() {
        let up = plan_set_quantity(10, 25).unwrap().unwrap();
        assert_eq!(up.delta, 15);
        assert_eq!(up.note, "stock corrected: 10 -> 25");

        let down = plan_set_quantity(25, 10).unwrap().unwrap();
        assert_eq!(down.delta, -15);
    }

    #[test]
    fn set_quantity_rejects_negative_target() {
        assert!(plan_set_quantity(10, -1).is_err());
    }

    #[test]
    fn disposal_writes_off_everything() {
        assert_eq!(plan_disposal(50).unwrap(), -50);
    }

    #[test]
    fn disposal_rejects_empty_stock() {
        let err = plan_disposal(0).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: folding any delta sequence through the planner keeps the
        /// quantity equal to the sum of accepted deltas and never negative.
        #[test]
        fn quantity_tracks_accepted_deltas(
            deltas in prop::collection::vec(-500i64..=500, 1..50)
        ) {
            let mut quantity = 0i64;
            let mut accepted = 0i64;
            for delta in deltas {
                match plan_adjustment(quantity, delta) {
                    Ok(new_quantity) => {
                        quantity = new_quantity;
                        accepted += delta;
                    }
                    Err(DomainError::Validation(_)) => prop_assert_eq!(delta, 0),
                    Err(DomainError::InsufficientStock { current, attempted }) => {
                        prop_assert_eq!(current, quantity);
                        prop_assert_eq!(attempted, delta);
                        prop_assert!(quantity + delta < 0);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {other:?}"),
                }
                prop_assert!(quantity >= 0);
                prop_assert_eq!(quantity, accepted);
            }
        }

        /// Property: a planned correction always lands exactly on target.
        #[test]
        fn set_quantity_lands_on_target(current in 0i64..=10_000, target in 0i64..=10_000) {
            match plan_set_quantity(current, target).unwrap() {
                Some(plan) => prop_assert_eq!(current + plan.delta, target),
                None => prop_assert_eq!(current, target),
            }
        }
    }
}
