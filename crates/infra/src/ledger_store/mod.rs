//! Ledger persistence boundary.
//!
//! The store owns the transactional contract of the stock ledger: every
//! committed adjustment writes the stock row and appends its log entry in
//! one atomic step guarded by the row's version token, without making any
//! storage assumptions beyond that.

pub mod in_memory;
pub mod query;
pub mod r#trait;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryLedgerStore;
pub use query::{
    LogQuery, LogQueryResult, Pagination, SnapshotQuery, SnapshotSort, SortOrder,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use r#trait::{LedgerStore, LedgerStoreError, StockCommit};
