//! `rxstock-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the ledger and
//! forecast crates (no infrastructure concerns): typed identifiers, the
//! domain error taxonomy, the optimistic-concurrency version token, and the
//! pharmacy value objects (`MonthYear`, `DosageForm`, `ReasonCode`).

pub mod error;
pub mod form;
pub mod id;
pub mod month;
pub mod reason;
pub mod version;

pub use error::{DomainError, DomainResult};
pub use form::DosageForm;
pub use id::{ActorId, ItemId, LogEntryId};
pub use month::MonthYear;
pub use reason::ReasonCode;
pub use version::ExpectedVersion;
