//! Postgres-backed ledger store implementation.
//!
//! Persists items, stock levels and the adjustment log in PostgreSQL, with
//! the ledger's consistency rules enforced at the database level: the stock
//! row carries a version column guarding every commit, and active-item key
//! uniqueness is a partial unique index.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `LedgerStoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | LedgerStoreError | Scenario |
//! |------------|----------------------|------------------|----------|
//! | Database (unique violation) | `23505` | `DuplicateKey` | Active item with the same (name, form, expiry) already exists |
//! | Database (check constraint violation) | `23514` | `Backend` | Negative quantity reached storage (planner bug) |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed | N/A | `Backend` | Connection pool was closed |
//! | Other | N/A | `Backend` | Network errors, connection failures, etc. |
//!
//! A stock upsert whose version guard matches no row is reported as
//! `Concurrency`, not through the table above.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{instrument, Span};

use rxstock_core::{ActorId, ItemId, LogEntryId};
use rxstock_ledger::{BatchRecord, Item, LogEntry, StockLevel};

use super::query::{LogQuery, LogQueryResult, Pagination, SnapshotQuery, SnapshotSort, SortOrder};
use super::r#trait::{LedgerStore, LedgerStoreError, StockCommit};

/// Postgres-backed [`LedgerStore`].
///
/// ## Commit protocol
///
/// `commit()` runs in one transaction:
/// 1. Lock the item row (`SELECT ... FOR UPDATE`) and check it is still
///    active; a disposal that won the race fails the commit here
/// 2. Lock and read the current stock version (`SELECT ... FOR UPDATE`)
/// 3. Validate it against the commit's expected version
/// 4. Upsert the stock row with a `WHERE version = <read>` guard
/// 5. Deactivate the item when the commit asks for it
/// 6. Append the log entry
///
/// A writer racing on the same item either fails the version validation or
/// matches no row on the guarded upsert; both surface as `Concurrency`.
/// The item row lock holds off concurrent deactivations until the
/// transaction ends, so the activity check cannot go stale mid-commit.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS items (
        item_id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        form TEXT NOT NULL,
        expiry TEXT,
        active BOOLEAN NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    // Uniqueness applies to active items only; deactivation frees the key.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS items_active_key_idx
    ON items (lower(name), form, COALESCE(expiry, ''))
    WHERE active
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stock_levels (
        item_id UUID PRIMARY KEY REFERENCES items (item_id),
        quantity BIGINT NOT NULL CHECK (quantity >= 0),
        version BIGINT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS adjustment_log (
        entry_id UUID PRIMARY KEY,
        item_id UUID NOT NULL REFERENCES items (item_id),
        delta BIGINT NOT NULL,
        reason TEXT NOT NULL,
        note TEXT,
        actor_id UUID NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS adjustment_log_item_recorded_idx
    ON adjustment_log (item_id, recorded_at DESC)
    "#,
];

impl PostgresLedgerStore {
    /// Create a new PostgresLedgerStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect to the given database URL with a small pool.
    pub async fn connect(database_url: &str) -> Result<Self, LedgerStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the ledger tables and indexes when they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), LedgerStoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self, item), fields(item_id = %item.id), err)]
    async fn insert_item(&self, item: Item) -> Result<(), LedgerStoreError> {
        sqlx::query(
            r#"
            INSERT INTO items (
                item_id,
                name,
                description,
                form,
                expiry,
                active,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.form.as_str())
        .bind(item.expiry.map(|m| m.to_string()))
        .bind(item.active)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(())
    }

    #[instrument(skip(self, item), fields(item_id = %item.id), err)]
    async fn update_item(&self, item: Item) -> Result<(), LedgerStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE items
            SET name = $2,
                description = $3,
                form = $4,
                expiry = $5,
                active = $6,
                updated_at = $7
            WHERE item_id = $1
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.form.as_str())
        .bind(item.expiry.map(|m| m.to_string()))
        .bind(item.active)
        .bind(item.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;
        if result.rows_affected() == 0 {
            return Err(LedgerStoreError::NotFound(item.id.to_string()));
        }
        Ok(())
    }

    async fn item(&self, item_id: ItemId) -> Result<Option<Item>, LedgerStoreError> {
        let row = sqlx::query(
            r#"
            SELECT item_id, name, description, form, expiry, active, created_at, updated_at
            FROM items
            WHERE item_id = $1
            "#,
        )
        .bind(item_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("item", e))?;
        row.map(|row| read_item(&row)).transpose()
    }

    async fn stock_level(&self, item_id: ItemId) -> Result<Option<StockLevel>, LedgerStoreError> {
        let row = sqlx::query(
            r#"
            SELECT item_id, quantity, version, updated_at
            FROM stock_levels
            WHERE item_id = $1
            "#,
        )
        .bind(item_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("stock_level", e))?;
        row.map(|row| read_stock_level(&row)).transpose()
    }

    #[instrument(
        skip(self, commit),
        fields(
            item_id = %commit.item_id,
            expected = ?commit.expected,
            delta = commit.entry.delta,
            reason = %commit.entry.reason,
            new_version = tracing::field::Empty
        ),
        err
    )]
    async fn commit(&self, commit: StockCommit) -> Result<(), LedgerStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let item_row = sqlx::query("SELECT active FROM items WHERE item_id = $1 FOR UPDATE")
            .bind(commit.item_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_item", e))?;
        let active = match item_row {
            Some(row) => {
                let active: bool = row
                    .try_get("active")
                    .map_err(|e| LedgerStoreError::Backend(format!("failed to read active: {e}")))?;
                active
            }
            None => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(LedgerStoreError::NotFound(commit.item_id.to_string()));
            }
        };
        if !active {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(LedgerStoreError::InactiveItem(commit.item_id.to_string()));
        }

        let version_row =
            sqlx::query("SELECT version FROM stock_levels WHERE item_id = $1 FOR UPDATE")
                .bind(commit.item_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("lock_stock_level", e))?;
        let current_version = match version_row {
            Some(row) => {
                let version: i64 = row
                    .try_get("version")
                    .map_err(|e| LedgerStoreError::Backend(format!("failed to read version: {e}")))?;
                version as u64
            }
            None => 0,
        };

        if !commit.expected.matches(current_version) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(LedgerStoreError::Concurrency(format!(
                "stock version mismatch for item {} (expected: {:?}, actual: {current_version})",
                commit.item_id, commit.expected
            )));
        }

        // The guard repeats the version check inside the upsert: a first-write
        // race takes the conflict path and matches no row.
        let upsert = sqlx::query(
            r#"
            INSERT INTO stock_levels (item_id, quantity, version, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (item_id)
            DO UPDATE SET
                quantity = EXCLUDED.quantity,
                version = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at
            WHERE stock_levels.version = $5
            "#,
        )
        .bind(commit.item_id.as_uuid())
        .bind(commit.new_quantity)
        .bind((current_version + 1) as i64)
        .bind(commit.entry.recorded_at)
        .bind(current_version as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerStoreError::Concurrency(format!(
                    "concurrent first write detected for item {}",
                    commit.item_id
                ))
            } else {
                map_sqlx_error("upsert_stock_level", e)
            }
        })?;
        if upsert.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(LedgerStoreError::Concurrency(format!(
                "stock row for item {} changed underneath the commit",
                commit.item_id
            )));
        }

        if commit.deactivate_item {
            sqlx::query("UPDATE items SET active = FALSE, updated_at = $2 WHERE item_id = $1")
                .bind(commit.item_id.as_uuid())
                .bind(commit.entry.recorded_at)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("deactivate_item", e))?;
        }

        sqlx::query(
            r#"
            INSERT INTO adjustment_log (entry_id, item_id, delta, reason, note, actor_id, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(commit.entry.id.as_uuid())
        .bind(commit.entry.item_id.as_uuid())
        .bind(commit.entry.delta)
        .bind(commit.entry.reason.as_str())
        .bind(&commit.entry.note)
        .bind(commit.entry.actor_id.as_uuid())
        .bind(commit.entry.recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("append_log_entry", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("new_version", current_version + 1);
        Ok(())
    }

    #[instrument(skip(self, query), err)]
    async fn snapshot(&self, query: SnapshotQuery) -> Result<Vec<BatchRecord>, LedgerStoreError> {
        let direction = match query.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let mut keys: Vec<String> = match query.sort_by {
            SnapshotSort::Name => vec![],
            SnapshotSort::Stock => vec![format!("COALESCE(s.quantity, 0) {direction}")],
            SnapshotSort::Form => vec![format!("i.form {direction}")],
            // Reorder "MM-YYYY" to "YYYYMM" so the text sort is chronological;
            // batches without an expiry sort after every dated batch.
            SnapshotSort::ExpiryDate => vec![
                format!("(i.expiry IS NULL) {direction}"),
                format!("substr(i.expiry, 4, 4) || substr(i.expiry, 1, 2) {direction}"),
            ],
        };
        keys.push(format!("lower(i.name) {direction}"));

        let sql = format!(
            r#"
            SELECT
                i.item_id, i.name, i.description, i.form, i.expiry,
                i.active, i.created_at, i.updated_at,
                COALESCE(s.quantity, 0) AS quantity
            FROM items i
            LEFT JOIN stock_levels s ON s.item_id = i.item_id
            WHERE i.active
                AND ($1::text IS NULL OR i.name ILIKE '%' || $1 || '%')
            ORDER BY {}
            "#,
            keys.join(", ")
        );

        let rows = sqlx::query(&sql)
            .bind(query.name.as_deref().map(escape_like))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("snapshot", e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let quantity: i64 = row
                .try_get("quantity")
                .map_err(|e| LedgerStoreError::Backend(format!("failed to read quantity: {e}")))?;
            records.push(BatchRecord {
                item: read_item(&row)?,
                quantity,
            });
        }
        Ok(records)
    }

    #[instrument(skip(self, query, pagination), err)]
    async fn query_logs(
        &self,
        query: LogQuery,
        pagination: Pagination,
    ) -> Result<LogQueryResult, LedgerStoreError> {
        let item_id_param = query.item_id.map(|id| *id.as_uuid());
        let reason_param = query.reason.map(|reason| reason.as_str());

        let count_row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM adjustment_log
            WHERE ($1::uuid IS NULL OR item_id = $1)
                AND ($2::text IS NULL OR reason = $2)
                AND ($3::timestamptz IS NULL OR recorded_at >= $3)
                AND ($4::timestamptz IS NULL OR recorded_at <= $4)
            "#,
        )
        .bind(item_id_param)
        .bind(reason_param)
        .bind(query.from)
        .bind(query.to)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_log_entries", e))?;
        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| LedgerStoreError::Backend(format!("failed to read count: {e}")))?;

        let rows = sqlx::query(
            r#"
            SELECT entry_id, item_id, delta, reason, note, actor_id, recorded_at
            FROM adjustment_log
            WHERE ($1::uuid IS NULL OR item_id = $1)
                AND ($2::text IS NULL OR reason = $2)
                AND ($3::timestamptz IS NULL OR recorded_at >= $3)
                AND ($4::timestamptz IS NULL OR recorded_at <= $4)
            ORDER BY recorded_at DESC, entry_id DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(item_id_param)
        .bind(reason_param)
        .bind(query.from)
        .bind(query.to)
        .bind(pagination.limit as i64)
        .bind(pagination.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_log_entries", e))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(read_log_entry(&row)?);
        }
        let has_more = pagination.offset + entries.len() < total as usize;

        Ok(LogQueryResult {
            entries,
            total: total as usize,
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
        let ids: Vec<uuid::Uuid> = item_ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT entry_id, item_id, delta, reason, note, actor_id, recorded_at
            FROM adjustment_log
            WHERE item_id = ANY($1)
                AND recorded_at >= $2
                AND recorded_at <= $3
            "#,
        )
        .bind(&ids)
        .bind(from)
        .bind(to)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("entries_in_range", e))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(read_log_entry(&row)?);
        }
        Ok(entries)
    }
}

fn read_item(row: &sqlx::postgres::PgRow) -> Result<Item, LedgerStoreError> {
    let item_id: uuid::Uuid = get(row, "item_id")?;
    let name: String = get(row, "name")?;
    let description: Option<String> = get(row, "description")?;
    let form: String = get(row, "form")?;
    let expiry: Option<String> = get(row, "expiry")?;
    Ok(Item {
        id: ItemId::from_uuid(item_id),
        name,
        description,
        form: form
            .parse()
            .map_err(|e| LedgerStoreError::Backend(format!("corrupt item row: {e}")))?,
        expiry: expiry
            .map(|m| m.parse())
            .transpose()
            .map_err(|e| LedgerStoreError::Backend(format!("corrupt item row: {e}")))?,
        active: get(row, "active")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn read_stock_level(row: &sqlx::postgres::PgRow) -> Result<StockLevel, LedgerStoreError> {
    let item_id: uuid::Uuid = get(row, "item_id")?;
    let version: i64 = get(row, "version")?;
    Ok(StockLevel {
        item_id: ItemId::from_uuid(item_id),
        quantity: get(row, "quantity")?,
        version: version as u64,
        updated_at: get(row, "updated_at")?,
    })
}

fn read_log_entry(row: &sqlx::postgres::PgRow) -> Result<LogEntry, LedgerStoreError> {
    let entry_id: uuid::Uuid = get(row, "entry_id")?;
    let item_id: uuid::Uuid = get(row, "item_id")?;
    let actor_id: uuid::Uuid = get(row, "actor_id")?;
    let reason: String = get(row, "reason")?;
    Ok(LogEntry {
        id: LogEntryId::from_uuid(entry_id),
        item_id: ItemId::from_uuid(item_id),
        delta: get(row, "delta")?,
        reason: reason
            .parse()
            .map_err(|e| LedgerStoreError::Backend(format!("corrupt log row: {e}")))?,
        note: get(row, "note")?,
        actor_id: ActorId::from_uuid(actor_id),
        recorded_at: get(row, "recorded_at")?,
    })
}

fn get<'r, T>(row: &'r sqlx::postgres::PgRow, column: &str) -> Result<T, LedgerStoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| LedgerStoreError::Backend(format!("failed to read column {column}: {e}")))
}

/// Map SQLx errors to LedgerStoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{operation}: {}", db_err.message());
            if is_unique_code(db_err.code().as_deref()) {
                LedgerStoreError::DuplicateKey(msg)
            } else {
                LedgerStoreError::Backend(msg)
            }
        }
        sqlx::Error::PoolClosed => {
            LedgerStoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => LedgerStoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

/// True when the database rejected a write on a unique index.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return is_unique_code(db_err.code().as_deref());
    }
    false
}

fn is_unique_code(code: Option<&str>) -> bool {
    code == Some("23505")
}

/// Escape `LIKE` metacharacters so a name filter matches literally, as the
/// in-memory store's substring match does.
fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
