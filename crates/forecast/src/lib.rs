//! Expiry-aware depletion forecasting.
//!
//! Pure, deterministic computation over a stock snapshot: given the expiry
//! batches of one medicine name and its trailing-month consumption, project
//! how long supply lasts (respecting expiry cliffs) and how much of each
//! batch will be used before it expires. No IO, no shared state; safe to
//! call from any number of concurrent readers.

pub mod depletion;
pub mod error;

pub use depletion::{
    BatchOutlook, BatchStock, DepletionForecast, DepletionOutlook, SupplyStatus,
};
pub use error::ForecastError;
