//! Trailing-window consumption aggregation.
//!
//! The forecast runs on one number per medicine group: units consumed over
//! the trailing month. Dispensations count in full; `ADJUSTMENT` entries
//! count only when negative (stock lost at a recount), since positive
//! corrections are stock found, not consumption. Every other reason code
//! (disposal, expiry write-offs, transfers) is movement, not consumption.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use rxstock_core::ReasonCode;

use crate::stock::LogEntry;

/// Half-open in spirit, inclusive in practice: `[from, to]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ConsumptionWindow {
    /// One calendar month back from `now`.
    pub fn trailing_month(now: DateTime<Utc>) -> Self {
        let from = now.checked_sub_months(Months::new(1)).unwrap_or(now);
        Self { from, to: now }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from <= instant && instant <= self.to
    }
}

/// Sum consumption over `entries` restricted to `window`.
pub fn monthly_consumption<'a>(
    entries: impl IntoIterator<Item = &'a LogEntry>,
    window: &ConsumptionWindow,
) -> i64 {
    entries
        .into_iter()
        .filter(|entry| window.contains(entry.recorded_at))
        .map(|entry| match entry.reason {
            ReasonCode::Dispensation => entry.delta.abs(),
            ReasonCode::Adjustment if entry.delta < 0 => -entry.delta,
            _ => 0,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rxstock_core::{ActorId, ItemId};

    fn entry(delta: i64, reason: ReasonCode, recorded_at: DateTime<Utc>) -> LogEntry {
        LogEntry::record(ItemId::new(), delta, reason, None, ActorId::new(), recorded_at)
    }

    #[test]
    fn sums_dispensations_and_negative_corrections() {
        let now = Utc::now();
        let window = ConsumptionWindow::trailing_month(now);
        let recent = now - Duration::days(3);
        let entries = vec![
            entry(-30, ReasonCode::Dispensation, recent),
            entry(-5, ReasonCode::Adjustment, recent),
            entry(12, ReasonCode::Adjustment, recent), // stock found: excluded
            entry(100, ReasonCode::Purchase, recent),  // inbound: excluded
            entry(-7, ReasonCode::Damaged, recent),    // other outbound: excluded
        ];
        assert_eq!(monthly_consumption(&entries, &window), 35);
    }

    #[test]
    fn ignores_entries_outside_the_window() {
        let now = Utc::now();
        let window = ConsumptionWindow::trailing_month(now);
        let entries = vec![
            entry(-10, ReasonCode::Dispensation, now - Duration::days(45)),
            entry(-10, ReasonCode::Dispensation, now - Duration::days(2)),
        ];
        assert_eq!(monthly_consumption(&entries, &window), 10);
    }

    #[test]
    fn empty_log_consumes_nothing() {
        let window = ConsumptionWindow::trailing_month(Utc::now());
        assert_eq!(monthly_consumption(&[], &window), 0);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let now = Utc::now();
        let window = ConsumptionWindow::trailing_month(now);
        let entries = vec![
            entry(-4, ReasonCode::Dispensation, window.from),
            entry(-6, ReasonCode::Dispensation, window.to),
        ];
        assert_eq!(monthly_consumption(&entries, &window), 10);
    }
}
