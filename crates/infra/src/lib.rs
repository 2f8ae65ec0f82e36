//! Infrastructure layer: persistence boundary and service orchestration.

pub mod ledger_service;
pub mod ledger_store;


pub use ledger_service::{LedgerService, MedicineOverview, SetOutcome};
pub use ledger_store::{
    InMemoryLedgerStore, LedgerStore, LedgerStoreError, LogQuery, LogQueryResult,
    Pagination, SnapshotQuery, SnapshotSort, SortOrder, StockCommit, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};

#[cfg(feature = "postgres")]
pub use ledger_store::postgres::PostgresLedgerStore;
