//! Uuid-backed identifier newtypes for items, log entries, and actors.
//!
//! Keeping these distinct types (rather than passing `Uuid` around) makes it
//! impossible to hand an actor id to a function expecting an item id.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a stocked item (one name/form/expiry unit).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

/// Identifier of an adjustment log entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEntryId(Uuid);

/// Identifier of the actor recorded on an adjustment.
///
/// Opaque to the core: authentication supplies it, the audit log stores it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Mint a fresh id.
            ///
            /// v7 uuids carry a timestamp prefix, so freshly minted ids sort in
            /// creation order; the audit log leans on this to break ties between
            /// entries recorded at the same instant.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wrap an id read back from storage.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Borrow the raw uuid, mainly for binding into queries.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match Uuid::parse_str(s) {
                    Ok(uuid) => Ok(Self(uuid)),
                    Err(e) => Err(DomainError::invalid_id(format!("malformed {}: {e}", $name))),
                }
            }
        }
    };
}

impl_uuid_newtype!(ItemId, "ItemId");
impl_uuid_newtype!(LogEntryId, "LogEntryId");
impl_uuid_newtype!(ActorId, "ActorId");
