//! Dosage forms stocked by the pharmacy.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Closed set of dosage forms. Part of an item's uniqueness key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DosageForm {
    Tablet,
    Capsule,
    Gel,
    EyeDrops,
    Powder,
    GelCapsule,
    Cream,
}

impl DosageForm {
    pub const ALL: [DosageForm; 7] = [
        DosageForm::Tablet,
        DosageForm::Capsule,
        DosageForm::Gel,
        DosageForm::EyeDrops,
        DosageForm::Powder,
        DosageForm::GelCapsule,
        DosageForm::Cream,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DosageForm::Tablet => "TABLET",
            DosageForm::Capsule => "CAPSULE",
            DosageForm::Gel => "GEL",
            DosageForm::EyeDrops => "EYE_DROPS",
            DosageForm::Powder => "POWDER",
            DosageForm::GelCapsule => "GEL_CAPSULE",
            DosageForm::Cream => "CREAM",
        }
    }
}

impl fmt::Display for DosageForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DosageForm {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|form| form.as_str() == s)
            .copied()
            .ok_or_else(|| {
                DomainError::validation(format!("unknown dosage form: {s:?}"))
            })
    }
}
