use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rxstock_core::{DomainError, DomainResult, DosageForm, ItemId, MonthYear};

/// Uniqueness key for an item: (name, form, expiry).
///
/// Name comparison is case-insensitive; the key stores the lowercased form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    name: String,
    form: DosageForm,
    expiry: Option<MonthYear>,
}

impl ItemKey {
    pub fn of(name: &str, form: DosageForm, expiry: Option<MonthYear>) -> Self {
        Self {
            name: name.trim().to_lowercase(),
            form,
            expiry,
        }
    }
}

/// A distinct stocked unit: one medicine name in one dosage form with one
/// expiry batch. Soft-deleted via `active`; never hard-deleted, so the audit
/// log always resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub description: Option<String>,
    pub form: DosageForm,
    pub expiry: Option<MonthYear>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Attributes for creating an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub description: Option<String>,
    pub form: DosageForm,
    pub expiry: Option<MonthYear>,
}

/// Partial edit of an item. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub form: Option<DosageForm>,
    pub expiry: Option<Option<MonthYear>>,
}

impl Item {
    pub fn create(draft: NewItem, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = normalize_name(&draft.name)?;
        Ok(Self {
            id: ItemId::new(),
            name,
            description: normalize_description(draft.description),
            form: draft.form,
            expiry: draft.expiry,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::of(&self.name, self.form, self.expiry)
    }

    pub fn apply_patch(&mut self, patch: ItemPatch, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(name) = patch.name {
            self.name = normalize_name(&name)?;
        }
        if let Some(description) = patch.description {
            self.description = normalize_description(Some(description));
        }
        if let Some(form) = patch.form {
            self.form = form;
        }
        if let Some(expiry) = patch.expiry {
            self.expiry = expiry;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Mark inactive. Idempotent; returns whether the flag changed.
    pub fn deactivate(&mut self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.updated_at = now;
        true
    }

    /// Adjustments only target live items.
    pub fn ensure_active(&self) -> DomainResult<()> {
        if self.active {
            Ok(())
        } else {
            Err(DomainError::validation(format!(
                "item {} is inactive and cannot be adjusted",
                self.id
            )))
        }
    }
}

fn normalize_name(raw: &str) -> DomainResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    Ok(name.to_string())
}

fn normalize_description(raw: Option<String>) -> Option<String> {
    raw.map(|d| d.trim().to_string()).filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str) -> NewItem {
        NewItem {
            name: name.to_string(),
            description: None,
            form: DosageForm::Tablet,
            expiry: None,
        }
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn create_trims_name_and_starts_active() {
        let item = Item::create(draft("  Amoxicillin "), test_time()).unwrap();
        assert_eq!(item.name, "Amoxicillin");
        assert!(item.active);
        assert!(item.description.is_none());
    }

    #[test]
    fn create_rejects_blank_name() {
        let err = Item::create(draft("   "), test_time()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn key_is_case_insensitive_on_name() {
        let expiry = "06-2027".parse::<MonthYear>().ok();
        let a = ItemKey::of("Aspirin", DosageForm::Tablet, expiry);
        let b = ItemKey::of("  aspirin", DosageForm::Tablet, expiry);
        assert_eq!(a, b);
        let c = ItemKey::of("Aspirin", DosageForm::Capsule, expiry);
        assert_ne!(a, c);
        let d = ItemKey::of("Aspirin", DosageForm::Tablet, None);
        assert_ne!(a, d);
    }

    #[test]
    fn patch_edits_only_supplied_fields() {
        let mut item = Item::create(draft("Ibuprofen"), test_time()).unwrap();
        let patch = ItemPatch {
            expiry: Some("09-2027".parse::<MonthYear>().ok()),
            description: Some("200mg blister".to_string()),
            ..ItemPatch::default()
        };
        item.apply_patch(patch, test_time()).unwrap();
        assert_eq!(item.name, "Ibuprofen");
        assert_eq!(item.form, DosageForm::Tablet);
        assert_eq!(item.expiry, "09-2027".parse::<MonthYear>().ok());
        assert_eq!(item.description.as_deref(), Some("200mg blister"));
    }

    #[test]
    fn patch_rejects_blank_name() {
        let mut item = Item::create(draft("Ibuprofen"), test_time()).unwrap();
        let patch = ItemPatch {
            name: Some("  ".to_string()),
            ..ItemPatch::default()
        };
        assert!(item.apply_patch(patch, test_time()).is_err());
    }

    #[test]
    fn deactivate_is_idempotent() {
        let mut item = Item::create(draft("Saline"), test_time()).unwrap();
        assert!(item.deactivate(test_time()));
        assert!(!item.deactivate(test_time()));
        assert!(!item.active);
        assert!(item.ensure_active().is_err());
    }
}
