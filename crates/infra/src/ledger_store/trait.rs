use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use rxstock_core::{ExpectedVersion, ItemId};
use rxstock_ledger::{BatchRecord, Item, LogEntry, StockLevel};

use super::query::{LogQuery, LogQueryResult, Pagination, SnapshotQuery};

/// Errors surfaced by ledger store implementations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerStoreError {
    /// The expected stock version did not match the stored one.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// The referenced item does not exist.
    #[error("item not found: {0}")]
    NotFound(String),

    /// The item is inactive; the ledger only moves stock for live items.
    #[error("item inactive: {0}")]
    InactiveItem(String),

    /// An active item with the same identity key already exists.
    #[error("duplicate item key: {0}")]
    DuplicateKey(String),

    /// The storage backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A single atomic ledger write.
///
/// The store must persist the new stock quantity, append the log entry and
/// (when requested) deactivate the item in one transaction. The write only
/// succeeds when `expected` matches the stored stock version (a missing
/// stock row counts as version `0`) and the item is still active at commit
/// time. A `deactivate_item` write is the one that retires the item, so it
/// passes that check itself.
#[derive(Debug, Clone)]
pub struct StockCommit {
    pub item_id: ItemId,
    pub expected: ExpectedVersion,
    pub new_quantity: i64,
    pub entry: LogEntry,
    pub deactivate_item: bool,
}

/// # Ledger Store
///
/// Persistence contract for items, stock levels and the append-only
/// adjustment log.
///
/// ## Consistency
///
/// `commit` is the only way to change a quantity, and it is version-guarded:
/// two writers racing on the same item cannot both succeed from the same
/// read. It also re-checks inside its critical section that the item is
/// still active, so an adjustment racing a disposal cannot land after the
/// write-off. Everything else is a plain read or an item metadata write.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts a new item, enforcing key uniqueness among active items.
    async fn insert_item(&self, item: Item) -> Result<(), LedgerStoreError>;

    /// Replaces the stored item row.
    async fn update_item(&self, item: Item) -> Result<(), LedgerStoreError>;

    /// Fetches one item by id.
    async fn item(&self, item_id: ItemId) -> Result<Option<Item>, LedgerStoreError>;

    /// Fetches the current stock row for an item, if one has been written.
    async fn stock_level(&self, item_id: ItemId) -> Result<Option<StockLevel>, LedgerStoreError>;

    /// Applies one atomic, version-guarded ledger write.
    async fn commit(&self, commit: StockCommit) -> Result<(), LedgerStoreError>;

    /// Lists active items with their current quantities, filtered and sorted.
    async fn snapshot(&self, query: SnapshotQuery) -> Result<Vec<BatchRecord>, LedgerStoreError>;

    /// Queries the adjustment log, newest first, with pagination.
    async fn query_logs(
        &self,
        query: LogQuery,
        pagination: Pagination,
    ) -> Result<LogQueryResult, LedgerStoreError>;

    /// Returns all log entries for the given items recorded inside
    /// `[from, to]`, used to derive consumption rates.
    async fn entries_in_range(
        &self,
        item_ids: &[ItemId],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>, LedgerStoreError>;
}

#[async_trait]
impl<S: LedgerStore + ?Sized> LedgerStore for Arc<S> {
    async fn insert_item(&self, item: Item) -> Result<(), LedgerStoreError> {
        (**self).insert_item(item).await
    }

    async fn update_item(&self, item: Item) -> Result<(), LedgerStoreError> {
        (**self).update_item(item).await
    }

    async fn item(&self, item_id: ItemId) -> Result<Option<Item>, LedgerStoreError> {
        (**self).item(item_id).await
    }

    async fn stock_level(&self, item_id: ItemId) -> Result<Option<StockLevel>, LedgerStoreError> {
        (**self).stock_level(item_id).await
    }

    async fn commit(&self, commit: StockCommit) -> Result<(), LedgerStoreError> {
        (**self).commit(commit).await
    }

    async fn snapshot(&self, query: SnapshotQuery) -> Result<Vec<BatchRecord>, LedgerStoreError> {
        (**self).snapshot(query).await
    }

    async fn query_logs(
        &self,
        query: LogQuery,
        pagination: Pagination,
    ) -> Result<LogQueryResult, LedgerStoreError> {
        (**self).query_logs(query, pagination).await
    }

    async fn entries_in_range(
        &self,
        item_ids: &[ItemId],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>, LedgerStoreError> {
        (**self).entries_in_range(item_ids, from, to).await
    }
}
