use thiserror::Error;

/// Forecast failures. The engine is pure, so the only failure class is bad
/// input: quantities the ledger invariant upstream can never produce.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ForecastError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
