//! Chronological greedy depletion over expiry-sorted batches.
//!
//! Model:
//! - Batches expired before the reference month never forecast; they only
//!   report 0% projected use.
//! - Remaining batches deplete oldest-expiry-first at `monthly_consumption`
//!   units per month. A batch is never credited with lasting past its own
//!   expiry; surplus rolls into the next batch's window.
//! - The walk stops when stock runs out or the depletion clock catches up
//!   to an expiry. Batches it never reaches stay "not computed".

use serde::{Deserialize, Serialize};

use rxstock_core::{ItemId, MonthYear};

use crate::error::ForecastError;

/// One expiry batch of a medicine, as read from the ledger snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStock {
    /// Item backing this batch.
    pub item_id: ItemId,
    /// Expiry month; `None` when the batch tracks no expiry.
    pub expiry: Option<MonthYear>,
    /// Units on hand. Never negative (ledger invariant upstream).
    pub quantity: i64,
}

/// Projection for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutlook {
    /// Item backing this batch.
    pub item_id: ItemId,
    /// Expiry month copied from the input batch.
    pub expiry: Option<MonthYear>,
    /// Units on hand copied from the input batch.
    pub quantity: i64,
    /// Whole months until expiry, measured from the reference month and
    /// floored at 0. `None` when the batch tracks no expiry.
    pub months_until_expiry: Option<u32>,
    /// Expired strictly before the reference month; excluded from depletion.
    pub expired: bool,
    /// Rounded percent of this batch projected consumed before it expires.
    /// `None` means the depletion walk never reached the batch (rendered as
    /// 0, but distinct from a computed 0%).
    pub percent_consumed: Option<u8>,
}

/// Projection for a whole medicine group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepletionOutlook {
    /// Months of supply across the group, respecting expiry cliffs. `None`
    /// when no depletion rate exists (zero consumption or zero usable
    /// stock): "in stock, no forecast", which is not the same as zero.
    pub months_of_supply: Option<u32>,
    /// Total units in non-expired batches.
    pub usable_quantity: i64,
    /// Total units sitting in expired batches.
    pub expired_quantity: i64,
    /// Consumption rate the projection ran with (units per month).
    pub monthly_consumption: i64,
    /// Per-batch outlooks, in input order.
    pub batches: Vec<BatchOutlook>,
}

impl DepletionOutlook {
    pub fn total_quantity(&self) -> i64 {
        self.usable_quantity + self.expired_quantity
    }
}

/// Supply classification a consumer renders from the projection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplyStatus {
    OutOfStock,
    Critical,
    Low,
    Ok,
}

/// Deterministic depletion projector.
///
/// Configured with the reference month (comparisons happen at calendar-month
/// granularity) and the classification thresholds.
#[derive(Debug, Clone)]
pub struct DepletionForecast {
    reference: MonthYear,
    /// Months of supply at or below which the group is critical.
    critical_months: u32,
    /// Months of supply at or below which the group is low.
    low_months: u32,
}

impl DepletionForecast {
    pub fn new(reference: MonthYear) -> Self {
        Self {
            reference,
            critical_months: 3,
            low_months: 6,
        }
    }

    pub fn with_critical_months(mut self, months: u32) -> Self {
        self.critical_months = months;
        self
    }

    pub fn with_low_months(mut self, months: u32) -> Self {
        self.low_months = months;
        self
    }

    /// Project depletion for one medicine group.
    pub fn project(
        &self,
        batches: &[BatchStock],
        monthly_consumption: i64,
    ) -> Result<DepletionOutlook, ForecastError> {
        if monthly_consumption < 0 {
            return Err(ForecastError::InvalidInput(format!(
                "monthly consumption cannot be negative: {monthly_consumption}"
            )));
        }

        let mut outlooks = Vec::with_capacity(batches.len());
        let mut usable_quantity: i64 = 0;
        let mut expired_quantity: i64 = 0;
        for batch in batches {
            if batch.quantity < 0 {
                return Err(ForecastError::InvalidInput(format!(
                    "batch {} has negative quantity {}",
                    batch.item_id, batch.quantity
                )));
            }
            let months_until = batch
                .expiry
                .map(|expiry| self.reference.months_until(expiry));
            let expired = months_until.is_some_and(|m| m < 0);
            let bucket = if expired {
                &mut expired_quantity
            } else {
                &mut usable_quantity
            };
            *bucket = bucket.checked_add(batch.quantity).ok_or_else(|| {
                ForecastError::InvalidInput("total stock out of range".to_string())
            })?;
            outlooks.push(BatchOutlook {
                item_id: batch.item_id,
                expiry: batch.expiry,
                quantity: batch.quantity,
                months_until_expiry: months_until.map(|m| m.max(0) as u32),
                expired,
                // Expired batches are a computed 0%: nothing will be used.
                percent_consumed: expired.then_some(0),
            });
        }

        let all_expired = !outlooks.is_empty() && outlooks.iter().all(|o| o.expired);
        let months_of_supply = if all_expired {
            Some(0)
        } else if monthly_consumption == 0 || usable_quantity == 0 {
            None
        } else {
            Some(self.walk(&mut outlooks, monthly_consumption))
        };

        Ok(DepletionOutlook {
            months_of_supply,
            usable_quantity,
            expired_quantity,
            monthly_consumption,
            batches: outlooks,
        })
    }

    /// Greedy walk over non-expired batches in expiry order. Fills in
    /// `percent_consumed` for every batch it reaches and returns the total
    /// months of supply.
    fn walk(&self, outlooks: &mut [BatchOutlook], monthly_consumption: i64) -> u32 {
        let mut order: Vec<usize> = (0..outlooks.len())
            .filter(|&i| !outlooks[i].expired)
            .collect();
        // No-expiry batches sort as infinitely far: after every dated batch.
        order.sort_by_key(|&i| (outlooks[i].expiry.is_none(), outlooks[i].expiry));

        let mut remaining: i64 = 0;
        let mut total_months: i64 = 0;
        for index in order {
            let batch = &mut outlooks[index];
            // None = no expiry pressure at all.
            let months_until = batch.months_until_expiry.map(i64::from);
            remaining += batch.quantity;

            let lasts = remaining / monthly_consumption;
            let effective = match months_until {
                Some(m) => lasts.min(m),
                None => lasts,
            };

            batch.percent_consumed = Some(if months_until == Some(0) || batch.quantity == 0 {
                0
            } else {
                let used = (effective * monthly_consumption).min(batch.quantity);
                (used as f64 / batch.quantity as f64 * 100.0).round() as u8
            });

            if effective > 0 {
                total_months += effective;
                remaining -= effective * monthly_consumption;
            }
            // Stock exhausted, or the depletion clock caught the expiry:
            // later batches stay "not computed".
            if remaining <= 0 || months_until == Some(effective) {
                break;
            }
        }
        u32::try_from(total_months).unwrap_or(u32::MAX)
    }

    /// Classification bands the UI relies on. Zero total stock dominates.
    pub fn classify(&self, outlook: &DepletionOutlook) -> SupplyStatus {
        if outlook.total_quantity() == 0 {
            return SupplyStatus::OutOfStock;
        }
        match outlook.months_of_supply {
            Some(months) if months <= self.critical_months => SupplyStatus::Critical,
            Some(months) if months <= self.low_months => SupplyStatus::Low,
            _ => SupplyStatus::Ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reference() -> MonthYear {
        // Fixed reference keeps every projection deterministic.
        "08-2026".parse().unwrap()
    }

    fn forecast() -> DepletionForecast {
        DepletionForecast::new(reference())
    }

    fn batch(expiry: Option<&str>, quantity: i64) -> BatchStock {
        BatchStock {
            item_id: ItemId::new(),
            expiry: expiry.map(|e| e.parse().unwrap()),
            quantity,
        }
    }

    fn percents(outlook: &DepletionOutlook) -> Vec<Option<u8>> {
        outlook.batches.iter().map(|b| b.percent_consumed).collect()
    }

    #[test]
    fn single_batch_without_expiry_pressure() {
        let batches = vec![batch(Some("08-2030"), 120)];
        let outlook = forecast().project(&batches, 30).unwrap();
        assert_eq!(outlook.months_of_supply, Some(4));
        assert_eq!(percents(&outlook), vec![Some(100)]);
    }

    #[test]
    fn expiry_cliff_caps_the_projection() {
        // 120 units at 30/month would last 4 months, but the batch dies in 2.
        let batches = vec![batch(Some("10-2026"), 120)];
        let outlook = forecast().project(&batches, 30).unwrap();
        assert_eq!(outlook.months_of_supply, Some(2));
        assert_eq!(percents(&outlook), vec![Some(50)]);
    }

    #[test]
    fn cliff_break_leaves_later_batches_uncomputed() {
        let batches = vec![batch(Some("10-2026"), 120), batch(Some("08-2028"), 60)];
        let outlook = forecast().project(&batches, 30).unwrap();
        assert_eq!(outlook.months_of_supply, Some(2));
        assert_eq!(percents(&outlook), vec![Some(50), None]);
    }

    #[test]
    fn all_expired_forecasts_zero() {
        let batches = vec![batch(Some("07-2026"), 40), batch(Some("01-2025"), 10)];
        let outlook = forecast().project(&batches, 30).unwrap();
        assert_eq!(outlook.months_of_supply, Some(0));
        assert_eq!(percents(&outlook), vec![Some(0), Some(0)]);
        assert_eq!(outlook.usable_quantity, 0);
        assert_eq!(outlook.expired_quantity, 50);
        assert!(outlook.batches.iter().all(|b| b.expired));
    }

    #[test]
    fn zero_consumption_is_undefined_not_zero() {
        let batches = vec![batch(Some("08-2030"), 500)];
        let outlook = forecast().project(&batches, 0).unwrap();
        assert_eq!(outlook.months_of_supply, None);
        assert_eq!(percents(&outlook), vec![None]);
    }

    #[test]
    fn zero_usable_stock_is_undefined() {
        let batches = vec![batch(Some("08-2030"), 0)];
        let outlook = forecast().project(&batches, 30).unwrap();
        assert_eq!(outlook.months_of_supply, None);
    }

    #[test]
    fn empty_snapshot_is_undefined() {
        let outlook = forecast().project(&[], 30).unwrap();
        assert_eq!(outlook.months_of_supply, None);
        assert!(outlook.batches.is_empty());
    }

    #[test]
    fn multi_batch_rollover() {
        // First batch too small to cover a month; its stock rolls into the
        // second batch's window instead of being forecast on its own.
        let batches = vec![batch(Some("09-2026"), 10), batch(Some("08-2027"), 100)];
        let outlook = forecast().project(&batches, 20).unwrap();
        assert_eq!(outlook.months_of_supply, Some(5));
        assert_eq!(percents(&outlook), vec![Some(0), Some(100)]);
    }

    #[test]
    fn surplus_rolls_into_a_no_expiry_batch() {
        // Dated batch: 50 units, 5 months of runway, lasts 1 month at 30/mo
        // leaving 20 units; undated batch adds 100 -> 120 -> 4 more months.
        let batches = vec![batch(Some("01-2027"), 50), batch(None, 100)];
        let outlook = forecast().project(&batches, 30).unwrap();
        assert_eq!(outlook.months_of_supply, Some(5));
        assert_eq!(percents(&outlook), vec![Some(60), Some(100)]);
        assert_eq!(outlook.batches[1].months_until_expiry, None);
    }

    #[test]
    fn no_expiry_batches_sort_after_dated_ones() {
        // The undated batch is listed first but must deplete last.
        let batches = vec![batch(None, 100), batch(Some("01-2027"), 50)];
        let outlook = forecast().project(&batches, 30).unwrap();
        assert_eq!(outlook.months_of_supply, Some(5));
        assert_eq!(percents(&outlook), vec![Some(100), Some(60)]);
    }

    #[test]
    fn batch_expiring_in_the_reference_month_stops_the_walk() {
        // Expiry equal to the reference month is not expired, but gives the
        // batch zero runway: computed 0%, walk breaks, zero months total.
        let batches = vec![batch(Some("08-2026"), 90), batch(Some("08-2028"), 60)];
        let outlook = forecast().project(&batches, 30).unwrap();
        assert_eq!(outlook.months_of_supply, Some(0));
        assert_eq!(percents(&outlook), vec![Some(0), None]);
        assert!(!outlook.batches[0].expired);
        assert_eq!(outlook.batches[0].months_until_expiry, Some(0));
    }

    #[test]
    fn expired_batches_are_skipped_but_reported() {
        let batches = vec![batch(Some("05-2026"), 25), batch(Some("08-2030"), 120)];
        let outlook = forecast().project(&batches, 30).unwrap();
        assert_eq!(outlook.months_of_supply, Some(4));
        assert_eq!(percents(&outlook), vec![Some(0), Some(100)]);
        assert!(outlook.batches[0].expired);
        assert_eq!(outlook.usable_quantity, 120);
        assert_eq!(outlook.expired_quantity, 25);
    }

    #[test]
    fn rejects_negative_inputs() {
        let err = forecast().project(&[], -1).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidInput(_)));
        let err = forecast()
            .project(&[batch(None, -5)], 10)
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidInput(_)));
    }

    #[test]
    fn classification_bands() {
        let f = forecast();
        let outlook = |months, usable| DepletionOutlook {
            months_of_supply: months,
            usable_quantity: usable,
            expired_quantity: 0,
            monthly_consumption: 30,
            batches: Vec::new(),
        };
        assert_eq!(f.classify(&outlook(Some(5), 0)), SupplyStatus::OutOfStock);
        assert_eq!(f.classify(&outlook(Some(0), 40)), SupplyStatus::Critical);
        assert_eq!(f.classify(&outlook(Some(3), 40)), SupplyStatus::Critical);
        assert_eq!(f.classify(&outlook(Some(4), 40)), SupplyStatus::Low);
        assert_eq!(f.classify(&outlook(Some(6), 40)), SupplyStatus::Low);
        assert_eq!(f.classify(&outlook(Some(7), 40)), SupplyStatus::Ok);
        assert_eq!(f.classify(&outlook(None, 40)), SupplyStatus::Ok);
    }

    #[test]
    fn custom_thresholds_shift_the_bands() {
        let f = DepletionForecast::new(reference())
            .with_critical_months(1)
            .with_low_months(2);
        let outlook = DepletionOutlook {
            months_of_supply: Some(2),
            usable_quantity: 10,
            expired_quantity: 0,
            monthly_consumption: 5,
            batches: Vec::new(),
        };
        assert_eq!(f.classify(&outlook), SupplyStatus::Low);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: computed percentages stay within 0..=100 and expired
        /// batches always report a computed 0%.
        #[test]
        fn percentages_stay_in_bounds(
            quantities in prop::collection::vec(0i64..=5_000, 0..8),
            month_offsets in prop::collection::vec(-24i32..=36, 0..8),
            monthly in 0i64..=500,
        ) {
            let reference = reference();
            let batches: Vec<BatchStock> = quantities
                .iter()
                .zip(month_offsets.iter())
                .map(|(&quantity, &offset)| {
                    let shifted = 12 * reference.year() + (reference.month() as i32 - 1) + offset;
                    let expiry = MonthYear::new(
                        (shifted.rem_euclid(12) + 1) as u32,
                        shifted.div_euclid(12),
                    )
                    .unwrap();
                    BatchStock {
                        item_id: ItemId::new(),
                        expiry: Some(expiry),
                        quantity,
                    }
                })
                .collect();

            let outlook = forecast().project(&batches, monthly).unwrap();
            for batch in &outlook.batches {
                if let Some(percent) = batch.percent_consumed {
                    prop_assert!(percent <= 100);
                }
                if batch.expired {
                    prop_assert_eq!(batch.percent_consumed, Some(0));
                }
            }
        }

        /// Property: months of supply never exceeds what the usable stock
        /// could cover at the given rate.
        #[test]
        fn supply_months_never_exceed_stock_coverage(
            quantities in prop::collection::vec(0i64..=5_000, 1..8),
            monthly in 1i64..=500,
        ) {
            let batches: Vec<BatchStock> = quantities
                .iter()
                .map(|&quantity| BatchStock {
                    item_id: ItemId::new(),
                    expiry: None,
                    quantity,
                })
                .collect();
            let outlook = forecast().project(&batches, monthly).unwrap();
            if let Some(months) = outlook.months_of_supply {
                prop_assert!(i64::from(months) <= outlook.usable_quantity / monthly);
            }
        }
    }
}
