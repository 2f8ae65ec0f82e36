//! Calendar-month value object.
//!
//! Expiry dates in this system are tracked at month granularity with the
//! fixed wire format `"MM-YYYY"` (two-digit month, four-digit year). The
//! same type serves as the forecast's reference month, so month arithmetic
//! lives here.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A calendar month (`"MM-YYYY"` on the wire). Ordered chronologically.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct MonthYear {
    year: i32,
    month: u32,
}

impl MonthYear {
    /// Build from components. Month must be `1..=12`, year four digits.
    pub fn new(month: u32, year: i32) -> DomainResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(DomainError::validation(format!(
                "month out of range: {month} (expected 01..=12)"
            )));
        }
        if !(1000..=9999).contains(&year) {
            return Err(DomainError::validation(format!(
                "year out of range: {year} (expected four digits)"
            )));
        }
        Ok(Self { year, month })
    }

    /// The calendar month a UTC instant falls in.
    pub fn of(instant: DateTime<Utc>) -> Self {
        Self {
            year: instant.year(),
            month: instant.month(),
        }
    }

    /// The current calendar month.
    pub fn current() -> Self {
        Self::of(Utc::now())
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Signed whole months from `self` to `other`.
    ///
    /// Positive when `other` lies in the future relative to `self`, negative
    /// when it lies in the past, 0 for the same month.
    pub fn months_until(&self, other: MonthYear) -> i32 {
        (other.year - self.year) * 12 + (other.month as i32 - self.month as i32)
    }
}

impl fmt::Display for MonthYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:04}", self.month, self.year)
    }
}

impl FromStr for MonthYear {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed =
            || DomainError::validation(format!("expected \"MM-YYYY\", got {s:?}"));
        let (month_part, year_part) = s.split_once('-').ok_or_else(malformed)?;
        if month_part.len() != 2 || year_part.len() != 4 {
            return Err(malformed());
        }
        // Integer parsing tolerates a leading sign; the wire format is
        // digits only.
        if !month_part.bytes().all(|b| b.is_ascii_digit())
            || !year_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(malformed());
        }
        let month: u32 = month_part.parse().map_err(|_| malformed())?;
        let year: i32 = year_part.parse().map_err(|_| malformed())?;
        Self::new(month, year)
    }
}

impl TryFrom<String> for MonthYear {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthYear> for String {
    fn from(value: MonthYear) -> Self {
        value.to_string()
    }
}
