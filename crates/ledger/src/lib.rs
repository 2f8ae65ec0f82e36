//! Stock ledger domain module.
//!
//! This crate contains the business rules for pharmacy stock: item identity
//! and lifecycle, the adjustment planning rules (zero deltas rejected, stock
//! never negative), the append-only audit log types, consumption-window
//! aggregation, and medicine-name grouping. All of it is deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod consumption;
pub mod group;
pub mod item;
pub mod stock;

pub use consumption::{monthly_consumption, ConsumptionWindow};
pub use group::{group_by_name, BatchRecord, MedicineGroup};
pub use item::{Item, ItemKey, ItemPatch, NewItem};
pub use stock::{
    plan_adjustment, plan_disposal, plan_set_quantity, LogEntry, SetPlan, StockLevel,
};
