use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use rxstock_core::{DomainError, ItemId, ReasonCode};
use rxstock_ledger::LogEntry;

/// Hard cap on page size, applied even when callers ask for more.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Page size used when callers do not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Pagination window for log queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: usize,
    pub offset: usize,
}

impl Pagination {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: limit.min(MAX_PAGE_SIZE),
            offset,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

/// Filters for the adjustment log. All fields are optional and combine
/// with AND semantics; time bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub item_id: Option<ItemId>,
    pub reason: Option<ReasonCode>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// One page of log entries plus the total match count.
#[derive(Debug, Clone)]
pub struct LogQueryResult {
    pub entries: Vec<LogEntry>,
    /// Entries matching the filters across all pages.
    pub total: usize,
    pub pagination: Pagination,
    pub has_more: bool,
}

/// Sort key for inventory snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotSort {
    #[default]
    Name,
    Stock,
    Form,
    ExpiryDate,
}

impl FromStr for SnapshotSort {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NAME" => Ok(Self::Name),
            "STOCK" => Ok(Self::Stock),
            "FORM" => Ok(Self::Form),
            "EXPIRY_DATE" => Ok(Self::ExpiryDate),
            _ => Err(DomainError::validation(format!("unknown sort key: {s:?}"))),
        }
    }
}

/// Sort direction for inventory snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(DomainError::validation(format!(
                "unknown sort order: {s:?}"
            ))),
        }
    }
}

/// Filter and ordering for the active-inventory snapshot. The name filter
/// is a case-insensitive substring match.
#[derive(Debug, Clone, Default)]
pub struct SnapshotQuery {
    pub name: Option<String>,
    pub sort_by: SnapshotSort,
    pub order: SortOrder,
}
