//! Medicine-name grouping over a stock snapshot.
//!
//! Groups are derived, never persisted: built fresh from an Item+StockLevel
//! snapshot per request, for display and as the forecast's input unit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::item::Item;

/// One item joined with its current stock quantity. The row shape of
/// snapshot queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub item: Item,
    pub quantity: i64,
}

/// All batches sharing a medicine name (case-insensitive), across dosage
/// forms and expiry dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineGroup {
    /// Display name: kept as first seen in the snapshot.
    pub name: String,
    pub batches: Vec<BatchRecord>,
}

impl MedicineGroup {
    pub fn total_quantity(&self) -> i64 {
        self.batches.iter().map(|b| b.quantity).sum()
    }
}

/// Fold a snapshot into name groups, ordered by name.
pub fn group_by_name(batches: Vec<BatchRecord>) -> Vec<MedicineGroup> {
    let mut groups: BTreeMap<String, MedicineGroup> = BTreeMap::new();
    for batch in batches {
        let key = batch.item.name.trim().to_lowercase();
        groups
            .entry(key)
            .or_insert_with(|| MedicineGroup {
                name: batch.item.name.trim().to_string(),
                batches: Vec::new(),
            })
            .batches
            .push(batch);
    }
    groups.into_values().collect()
}
