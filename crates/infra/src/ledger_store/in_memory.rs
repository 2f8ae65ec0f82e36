use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use rxstock_core::ItemId;
use rxstock_ledger::{BatchRecord, Item, ItemKey, LogEntry, StockLevel};

use super::query::{LogQuery, LogQueryResult, Pagination, SnapshotQuery, SnapshotSort, SortOrder};
use super::r#trait::{LedgerStore, LedgerStoreError, StockCommit};

/// # In-Memory Ledger Store
///
/// Process-local [`LedgerStore`] backed by a single `RwLock`. Each trait
/// method takes the lock once, so a `commit` observes and writes item,
/// stock and log state atomically.
///
/// Used by the test suites and as the default backend when no database is
/// configured.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    items: HashMap<ItemId, Item>,
    /// Uniqueness index over ACTIVE items only; deactivation frees the key.
    keys: HashMap<ItemKey, ItemId>,
    stock: HashMap<ItemId, StockLevel>,
    log: Vec<LogEntry>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, LedgerStoreError> {
        self.inner
            .read()
            .map_err(|_| LedgerStoreError::Backend("ledger store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, LedgerStoreError> {
        self.inner
            .write()
            .map_err(|_| LedgerStoreError::Backend("ledger store lock poisoned".to_string()))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_item(&self, item: Item) -> Result<(), LedgerStoreError> {
        let mut inner = self.write()?;
        let key = item.key();
        if inner.keys.contains_key(&key) {
            return Err(LedgerStoreError::DuplicateKey(format!(
                "{} ({})",
                item.name, item.form
            )));
        }
        inner.keys.insert(key, item.id);
        inner.items.insert(item.id, item);
        Ok(())
    }

    async fn update_item(&self, item: Item) -> Result<(), LedgerStoreError> {
        let mut inner = self.write()?;
        let old_key = match inner.items.get(&item.id) {
            Some(existing) if existing.active => Some(existing.key()),
            Some(_) => None,
            None => return Err(LedgerStoreError::NotFound(item.id.to_string())),
        };
        let new_key = item.active.then(|| item.key());
        if let Some(key) = &new_key {
            if inner.keys.get(key).is_some_and(|owner| *owner != item.id) {
                return Err(LedgerStoreError::DuplicateKey(format!(
                    "{} ({})",
                    item.name, item.form
                )));
            }
        }
        if let Some(key) = old_key {
            inner.keys.remove(&key);
        }
        if let Some(key) = new_key {
            inner.keys.insert(key, item.id);
        }
        inner.items.insert(item.id, item);
        Ok(())
    }

    async fn item(&self, item_id: ItemId) -> Result<Option<Item>, LedgerStoreError> {
        Ok(self.read()?.items.get(&item_id).cloned())
    }

    async fn stock_level(&self, item_id: ItemId) -> Result<Option<StockLevel>, LedgerStoreError> {
        Ok(self.read()?.stock.get(&item_id).cloned())
    }

    async fn commit(&self, commit: StockCommit) -> Result<(), LedgerStoreError> {
        let mut inner = self.write()?;
        // Re-checked under the lock: a disposal committed after this writer's
        // read must fail the write, not be overwritten.
        let key = match inner.items.get(&commit.item_id) {
            Some(item) if !item.active => {
                return Err(LedgerStoreError::InactiveItem(commit.item_id.to_string()));
            }
            Some(item) => item.key(),
            None => return Err(LedgerStoreError::NotFound(commit.item_id.to_string())),
        };
        let current_version = inner
            .stock
            .get(&commit.item_id)
            .map(|level| level.version)
            .unwrap_or(0);
        if !commit.expected.matches(current_version) {
            return Err(LedgerStoreError::Concurrency(format!(
                "stock version mismatch for item {} (expected: {:?}, actual: {current_version})",
                commit.item_id, commit.expected
            )));
        }
        inner.stock.insert(
            commit.item_id,
            StockLevel {
                item_id: commit.item_id,
                quantity: commit.new_quantity,
                version: current_version + 1,
                updated_at: commit.entry.recorded_at,
            },
        );
        if commit.deactivate_item {
            let deactivated = inner
                .items
                .get_mut(&commit.item_id)
                .is_some_and(|item| item.deactivate(commit.entry.recorded_at));
            if deactivated {
                inner.keys.remove(&key);
            }
        }
        inner.log.push(commit.entry);
        Ok(())
    }

    async fn snapshot(&self, query: SnapshotQuery) -> Result<Vec<BatchRecord>, LedgerStoreError> {
        let inner = self.read()?;
        let needle = query.name.as_deref().map(str::to_lowercase);
        let mut records: Vec<BatchRecord> = inner
            .items
            .values()
            .filter(|item| item.active)
            .filter(|item| match &needle {
                Some(needle) => item.name.to_lowercase().contains(needle),
                None => true,
            })
            .map(|item| BatchRecord {
                quantity: inner
                    .stock
                    .get(&item.id)
                    .map(|level| level.quantity)
                    .unwrap_or(0),
                item: item.clone(),
            })
            .collect();
        sort_records(&mut records, query.sort_by, query.order);
        Ok(records)
    }

    async fn query_logs(
        &self,
        query: LogQuery,
        pagination: Pagination,
    ) -> Result<LogQueryResult, LedgerStoreError> {
        let inner = self.read()?;
        let mut matches: Vec<&LogEntry> = inner
            .log
            .iter()
            .filter(|entry| entry_matches(entry, &query))
            .collect();
        // Newest first; entry ids are time-ordered, which settles same-instant ties.
        matches.sort_by(|a, b| {
            (b.recorded_at, b.id.as_uuid()).cmp(&(a.recorded_at, a.id.as_uuid()))
        });
        let total = matches.len();
        let entries: Vec<LogEntry> = matches
            .into_iter()
            .skip(pagination.offset)
            .take(pagination.limit)
            .cloned()
            .collect();
        let has_more = pagination.offset + entries.len() < total;
        Ok(LogQueryResult {
            entries,
            total,
            pagination,
            has_more,
        })
    }

    async fn entries_in_range(
        &self,
        item_ids: &[ItemId],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>, LedgerStoreError> {
        let inner = self.read()?;
        Ok(inner
            .log
            .iter()
            .filter(|entry| item_ids.contains(&entry.item_id))
            .filter(|entry| entry.recorded_at >= from && entry.recorded_at <= to)
            .cloned()
            .collect())
    }
}

fn entry_matches(entry: &LogEntry, query: &LogQuery) -> bool {
    if query.item_id.is_some_and(|id| id != entry.item_id) {
        return false;
    }
    if query.reason.is_some_and(|reason| reason != entry.reason) {
        return false;
    }
    if query.from.is_some_and(|from| entry.recorded_at < from) {
        return false;
    }
    if query.to.is_some_and(|to| entry.recorded_at > to) {
        return false;
    }
    true
}

fn sort_records(records: &mut [BatchRecord], sort_by: SnapshotSort, order: SortOrder) {
    records.sort_by(|a, b| {
        let ordering = match sort_by {
            SnapshotSort::Name => Ordering::Equal,
            SnapshotSort::Stock => a.quantity.cmp(&b.quantity),
            SnapshotSort::Form => a.item.form.as_str().cmp(b.item.form.as_str()),
            SnapshotSort::ExpiryDate => {
                // Batches without an expiry sort after every dated batch.
                (a.item.expiry.is_none(), a.item.expiry)
                    .cmp(&(b.item.expiry.is_none(), b.item.expiry))
            }
        };
        let ordering = ordering
            .then_with(|| a.item.name.to_lowercase().cmp(&b.item.name.to_lowercase()));
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}
