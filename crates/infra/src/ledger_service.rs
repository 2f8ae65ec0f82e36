//! Ledger orchestration service.
//!
//! Every stock mutation runs the same pipeline:
//!
//! 1. Load the item and check it accepts adjustments
//! 2. Read the current stock level (missing row reads as empty)
//! 3. Plan the write with the pure rules from `rxstock_ledger`
//! 4. Commit atomically with `ExpectedVersion::Exact` on the read version
//!
//! A concurrency conflict at step 4 means another writer committed between
//! the read and the commit; the pipeline restarts from step 2 with a fresh
//! read, a bounded number of times. No committed adjustment is ever based
//! on a stale read. The store repeats the activity check from step 1 inside
//! its commit, so a disposal landing mid-pipeline fails the write instead
//! of being overwritten.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use rxstock_core::{
    ActorId, DomainError, DomainResult, ExpectedVersion, ItemId, MonthYear, ReasonCode,
};
use rxstock_forecast::{BatchStock, DepletionForecast, DepletionOutlook, SupplyStatus};
use rxstock_ledger::{
    group_by_name, monthly_consumption, plan_adjustment, plan_disposal, plan_set_quantity,
    BatchRecord, ConsumptionWindow, Item, ItemPatch, LogEntry, NewItem, StockLevel,
};

use crate::ledger_store::{
    LedgerStore, LedgerStoreError, LogQuery, LogQueryResult, Pagination, SnapshotQuery,
    StockCommit,
};

/// Retries after the first conflicted commit before giving up.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Application service over a [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct LedgerService<S> {
    store: S,
    max_retries: u32,
}

/// Result of an absolute stock correction. `entry` is `None` when the count
/// already matched and nothing was written.
#[derive(Debug, Clone, Serialize)]
pub struct SetOutcome {
    pub quantity: i64,
    pub entry: Option<LogEntry>,
}

/// One medicine group with its depletion projection and supply status.
#[derive(Debug, Clone, Serialize)]
pub struct MedicineOverview {
    pub name: String,
    pub status: SupplyStatus,
    pub outlook: DepletionOutlook,
}

/// An adjustment write decided against one observed quantity.
#[derive(Debug, Clone)]
struct PlannedCommit {
    new_quantity: i64,
    delta: i64,
    reason: ReasonCode,
    note: Option<String>,
    deactivate_item: bool,
}

impl<S: LedgerStore> LedgerService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Register a new item. The (name, form, expiry) key must be free among
    /// active items.
    #[instrument(skip(self, draft), fields(name = %draft.name), err)]
    pub async fn create_item(&self, draft: NewItem) -> DomainResult<Item> {
        let item = Item::create(draft, Utc::now())?;
        self.store
            .insert_item(item.clone())
            .await
            .map_err(store_error)?;
        info!(item_id = %item.id, "item created");
        Ok(item)
    }

    /// Edit item attributes. Quantities never move here; corrections go
    /// through `set_quantity`.
    #[instrument(skip(self, patch), fields(%item_id), err)]
    pub async fn update_item(&self, item_id: ItemId, patch: ItemPatch) -> DomainResult<Item> {
        let mut item = self.require_item(item_id).await?;
        item.apply_patch(patch, Utc::now())?;
        self.store
            .update_item(item.clone())
            .await
            .map_err(store_error)?;
        Ok(item)
    }

    pub async fn item(&self, item_id: ItemId) -> DomainResult<Item> {
        self.require_item(item_id).await
    }

    /// Current stock for an item; an item that was never adjusted reads as
    /// empty rather than missing.
    pub async fn stock_level(&self, item_id: ItemId) -> DomainResult<StockLevel> {
        self.require_item(item_id).await?;
        Ok(self
            .store
            .stock_level(item_id)
            .await
            .map_err(store_error)?
            .unwrap_or_else(|| StockLevel::empty(item_id)))
    }

    /// Retire an item without touching stock. Idempotent.
    #[instrument(skip(self), fields(%item_id), err)]
    pub async fn deactivate_item(&self, item_id: ItemId) -> DomainResult<Item> {
        let mut item = self.require_item(item_id).await?;
        if item.deactivate(Utc::now()) {
            self.store
                .update_item(item.clone())
                .await
                .map_err(store_error)?;
            info!(%item_id, "item deactivated");
        }
        Ok(item)
    }

    /// Apply a signed stock adjustment and append its audit entry.
    #[instrument(skip(self, note), fields(%item_id, delta, reason = %reason), err)]
    pub async fn apply_adjustment(
        &self,
        item_id: ItemId,
        delta: i64,
        reason: ReasonCode,
        note: Option<String>,
        actor_id: ActorId,
    ) -> DomainResult<LogEntry> {
        let item = self.require_item(item_id).await?;
        item.ensure_active()?;
        let entry = self
            .run_commit(item_id, actor_id, |current| {
                let new_quantity = plan_adjustment(current, delta)?;
                Ok(Some(PlannedCommit {
                    new_quantity,
                    delta,
                    reason,
                    note: note.clone(),
                    deactivate_item: false,
                }))
            })
            .await?;
        entry.ok_or_else(|| DomainError::store("commit produced no log entry"))
    }

    /// Correct the count to an absolute target. When the count already
    /// matches, nothing is written and no entry is returned.
    #[instrument(skip(self), fields(%item_id, target), err)]
    pub async fn set_quantity(
        &self,
        item_id: ItemId,
        target: i64,
        actor_id: ActorId,
    ) -> DomainResult<SetOutcome> {
        let item = self.require_item(item_id).await?;
        item.ensure_active()?;
        let entry = self
            .run_commit(item_id, actor_id, |current| {
                Ok(plan_set_quantity(current, target)?.map(|plan| PlannedCommit {
                    new_quantity: target,
                    delta: plan.delta,
                    reason: ReasonCode::Adjustment,
                    note: Some(plan.note),
                    deactivate_item: false,
                }))
            })
            .await?;
        Ok(SetOutcome {
            quantity: target,
            entry,
        })
    }

    /// Write off the full remaining stock and retire the item, atomically.
    /// The free-text reason lands in the audit entry's note.
    #[instrument(skip(self, reason), fields(%item_id), err)]
    pub async fn dispose(
        &self,
        item_id: ItemId,
        reason: &str,
        actor_id: ActorId,
    ) -> DomainResult<LogEntry> {
        let item = self.require_item(item_id).await?;
        if !item.active {
            return Err(DomainError::already_disposed(format!(
                "item {item_id} is already inactive"
            )));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::validation("disposal reason cannot be empty"));
        }
        let note = reason.to_string();
        let entry = self
            .run_commit(item_id, actor_id, |current| {
                let delta = plan_disposal(current)?;
                Ok(Some(PlannedCommit {
                    new_quantity: 0,
                    delta,
                    reason: ReasonCode::Dispose,
                    note: Some(note.clone()),
                    deactivate_item: true,
                }))
            })
            .await?;
        entry.ok_or_else(|| DomainError::store("commit produced no log entry"))
    }

    /// Active items with current quantities, filtered and sorted.
    pub async fn snapshot(&self, query: SnapshotQuery) -> DomainResult<Vec<BatchRecord>> {
        self.store.snapshot(query).await.map_err(store_error)
    }

    /// Page through the adjustment log, newest first.
    pub async fn query_logs(
        &self,
        query: LogQuery,
        pagination: Pagination,
    ) -> DomainResult<LogQueryResult> {
        self.store
            .query_logs(query, pagination)
            .await
            .map_err(store_error)
    }

    /// Group active items by medicine name and project depletion for each
    /// group from its trailing-month consumption.
    #[instrument(skip(self), fields(filter = name_filter.unwrap_or("")), err)]
    pub async fn medicine_overview(
        &self,
        name_filter: Option<&str>,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<MedicineOverview>> {
        let records = self
            .store
            .snapshot(SnapshotQuery {
                name: name_filter.map(str::to_string),
                ..SnapshotQuery::default()
            })
            .await
            .map_err(store_error)?;
        let groups = group_by_name(records);
        let window = ConsumptionWindow::trailing_month(now);
        let forecast = DepletionForecast::new(MonthYear::of(now));

        let mut overviews = Vec::with_capacity(groups.len());
        for group in groups {
            let item_ids: Vec<ItemId> = group.batches.iter().map(|batch| batch.item.id).collect();
            let entries = self
                .store
                .entries_in_range(&item_ids, window.from, window.to)
                .await
                .map_err(store_error)?;
            let consumed = monthly_consumption(&entries, &window);
            let batches: Vec<BatchStock> = group
                .batches
                .iter()
                .map(|batch| BatchStock {
                    item_id: batch.item.id,
                    expiry: batch.item.expiry,
                    quantity: batch.quantity,
                })
                .collect();
            let outlook = forecast.project(&batches, consumed).map_err(|e| {
                DomainError::store(format!("forecast rejected ledger snapshot: {e}"))
            })?;
            let status = forecast.classify(&outlook);
            overviews.push(MedicineOverview {
                name: group.name,
                status,
                outlook,
            });
        }
        Ok(overviews)
    }

    /// Read-plan-commit loop with bounded retry on version conflicts.
    ///
    /// `plan` sees the quantity from the latest read and either rejects the
    /// operation, declares a no-op (`None`), or produces the write. Planning
    /// reruns on every retry, so its decision is never based on a quantity
    /// another writer has since replaced.
    async fn run_commit<F>(
        &self,
        item_id: ItemId,
        actor_id: ActorId,
        plan: F,
    ) -> DomainResult<Option<LogEntry>>
    where
        F: Fn(i64) -> DomainResult<Option<PlannedCommit>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let level = self
                .store
                .stock_level(item_id)
                .await
                .map_err(store_error)?
                .unwrap_or_else(|| StockLevel::empty(item_id));
            let Some(planned) = plan(level.quantity)? else {
                return Ok(None);
            };
            let entry = LogEntry::record(
                item_id,
                planned.delta,
                planned.reason,
                planned.note.clone(),
                actor_id,
                Utc::now(),
            );
            let commit = StockCommit {
                item_id,
                expected: ExpectedVersion::Exact(level.version),
                new_quantity: planned.new_quantity,
                entry: entry.clone(),
                deactivate_item: planned.deactivate_item,
            };
            match self.store.commit(commit).await {
                Ok(()) => return Ok(Some(entry)),
                Err(LedgerStoreError::Concurrency(detail)) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        warn!(%item_id, attempts = attempt, "stock commit conflicted on every retry");
                        return Err(DomainError::conflict(format!(
                            "stock for item {item_id} kept changing underneath the adjustment \
                             (gave up after {attempt} attempts)"
                        )));
                    }
                    debug!(%item_id, attempt, %detail, "stock commit conflicted, retrying from a fresh read");
                }
                Err(other) => return Err(store_error(other)),
            }
        }
    }

    async fn require_item(&self, item_id: ItemId) -> DomainResult<Item> {
        self.store
            .item(item_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| DomainError::not_found(format!("item {item_id} not found")))
    }
}

fn store_error(err: LedgerStoreError) -> DomainError {
    match err {
        LedgerStoreError::Concurrency(msg) => DomainError::conflict(msg),
        LedgerStoreError::NotFound(msg) => DomainError::not_found(msg),
        // Commit-time detection means a disposal won the race after this
        // writer's pre-flight check.
        LedgerStoreError::InactiveItem(id) => {
            DomainError::already_disposed(format!("item {id} is already inactive"))
        }
        LedgerStoreError::DuplicateKey(_) => {
            DomainError::conflict("an item with the same name, form and expiry already exists")
        }
        LedgerStoreError::Backend(msg) => DomainError::store(msg),
    }
}
