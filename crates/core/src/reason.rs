//! Reason codes classifying why a stock quantity changed.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Closed set of adjustment reasons. Every log entry carries exactly one.
///
/// `Dispensation` and negative-delta `Adjustment` entries feed the
/// consumption figure the forecast runs on; `Dispose` is reserved for the
/// compound disposal operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    Purchase,
    Dispensation,
    Adjustment,
    Transfer,
    Expired,
    Damaged,
    Return,
    Dispose,
}

impl ReasonCode {
    pub const ALL: [ReasonCode; 8] = [
        ReasonCode::Purchase,
        ReasonCode::Dispensation,
        ReasonCode::Adjustment,
        ReasonCode::Transfer,
        ReasonCode::Expired,
        ReasonCode::Damaged,
        ReasonCode::Return,
        ReasonCode::Dispose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Purchase => "PURCHASE",
            ReasonCode::Dispensation => "DISPENSATION",
            ReasonCode::Adjustment => "ADJUSTMENT",
            ReasonCode::Transfer => "TRANSFER",
            ReasonCode::Expired => "EXPIRED",
            ReasonCode::Damaged => "DAMAGED",
            ReasonCode::Return => "RETURN",
            ReasonCode::Dispose => "DISPOSE",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|reason| reason.as_str() == s)
            .copied()
            .ok_or_else(|| {
                DomainError::validation(format!("unknown reason code: {s:?}"))
            })
    }
}
