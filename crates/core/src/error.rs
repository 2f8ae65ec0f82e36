//! Error taxonomy for ledger and forecasting operations.

use thiserror::Error;

/// Shorthand result for fallible domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Business-rule failure.
///
/// Keep this focused on deterministic business failures (validation, stock
/// shortfalls, conflicts). Infrastructure failures are mapped into `Store`
/// at the service boundary and are fatal to the request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, zero delta).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An id string did not parse as a uuid.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// An adjustment would drive the on-hand quantity negative.
    ///
    /// Carries the quantity on hand and the rejected delta so callers can
    /// tell a user exactly how many units are available.
    #[error("insufficient stock: {current} on hand, adjustment of {attempted} rejected")]
    InsufficientStock { current: i64, attempted: i64 },

    /// Disposal was requested for an item that is already inactive.
    #[error("already disposed: {0}")]
    AlreadyDisposed(String),

    /// A conflict occurred (stale version / optimistic concurrency, or a
    /// uniqueness collision).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Underlying storage failure. Never swallowed.
    #[error("storage failure: {0}")]
    Store(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn insufficient_stock(current: i64, attempted: i64) -> Self {
        Self::InsufficientStock { current, attempted }
    }

    pub fn already_disposed(msg: impl Into<String>) -> Self {
        Self::AlreadyDisposed(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }
}
