use std::sync::Arc;

use rxstock_infra::{InMemoryLedgerStore, LedgerService, LedgerStore};

#[cfg(feature = "postgres")]
use rxstock_infra::PostgresLedgerStore;

// Type-erased ledger service; both backends run through it.
pub type SharedLedgerService = LedgerService<Arc<dyn LedgerStore>>;

/// Services shared by all request handlers.
#[derive(Clone)]
pub struct AppServices {
    pub ledger: SharedLedgerService,
}

impl AppServices {
    /// In-memory ledger (dev/test): state lives and dies with the process.
    pub fn in_memory() -> Self {
        let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
        Self {
            ledger: LedgerService::new(store),
        }
    }

    /// Postgres-backed ledger; creates the schema when it does not exist yet.
    #[cfg(feature = "postgres")]
    pub async fn postgres(database_url: &str) -> anyhow::Result<Self> {
        let store = PostgresLedgerStore::connect(database_url).await?;
        store.ensure_schema().await?;
        let store: Arc<dyn LedgerStore> = Arc::new(store);
        Ok(Self {
            ledger: LedgerService::new(store),
        })
    }
}
