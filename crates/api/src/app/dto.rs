use chrono::{DateTime, Utc};
use serde::Deserialize;

use rxstock_core::{DosageForm, ItemId, MonthYear, ReasonCode};
use rxstock_infra::MedicineOverview;
use rxstock_ledger::{Item, LogEntry};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub description: Option<String>,
    pub form: String,
    pub expiry: Option<String>,
}

/// Partial item edit. `expiry` distinguishes "leave untouched" (absent) from
/// "clear" (explicit null).
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub form: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub expiry: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub quantity_delta: i64,
    pub reason_code: String,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub target_quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct DisposeItemRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotParams {
    pub name: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogParams {
    pub item_id: Option<String>,
    pub reason_code: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct MedicineParams {
    pub name: Option<String>,
}

fn double_option<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(de).map(Some)
}

// -------------------------
// Parse helpers
// -------------------------

pub fn parse_item_id(raw: &str) -> Result<ItemId, axum::response::Response> {
    raw.parse::<ItemId>().map_err(errors::domain_error_to_response)
}

pub fn parse_form(raw: &str) -> Result<DosageForm, axum::response::Response> {
    raw.parse::<DosageForm>()
        .map_err(errors::domain_error_to_response)
}

pub fn parse_reason(raw: &str) -> Result<ReasonCode, axum::response::Response> {
    raw.parse::<ReasonCode>()
        .map_err(errors::domain_error_to_response)
}

pub fn parse_expiry(raw: Option<String>) -> Result<Option<MonthYear>, axum::response::Response> {
    raw.map(|s| s.parse::<MonthYear>())
        .transpose()
        .map_err(errors::domain_error_to_response)
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn item_to_json(item: &Item, quantity: i64) -> serde_json::Value {
    serde_json::json!({
        "id": item.id.to_string(),
        "name": item.name,
        "description": item.description,
        "form": item.form.as_str(),
        "expiry": item.expiry.map(|m| m.to_string()),
        "active": item.active,
        "quantity": quantity,
        "created_at": item.created_at.to_rfc3339(),
        "updated_at": item.updated_at.to_rfc3339(),
    })
}

pub fn log_entry_to_json(entry: &LogEntry) -> serde_json::Value {
    serde_json::json!({
        "id": entry.id.to_string(),
        "item_id": entry.item_id.to_string(),
        "delta": entry.delta,
        "reason_code": entry.reason.as_str(),
        "note": entry.note,
        "actor_id": entry.actor_id.to_string(),
        "recorded_at": entry.recorded_at.to_rfc3339(),
    })
}

pub fn overview_to_json(overview: &MedicineOverview) -> serde_json::Value {
    serde_json::json!({
        "name": overview.name,
        "status": overview.status,
        "months_of_supply": overview.outlook.months_of_supply,
        "usable_quantity": overview.outlook.usable_quantity,
        "expired_quantity": overview.outlook.expired_quantity,
        "monthly_consumption": overview.outlook.monthly_consumption,
        "batches": overview
            .outlook
            .batches
            .iter()
            .map(|b| serde_json::json!({
                "item_id": b.item_id.to_string(),
                "expiry": b.expiry.map(|m| m.to_string()),
                "quantity": b.quantity,
                "months_until_expiry": b.months_until_expiry,
                "expired": b.expired,
                "percent_consumed": b.percent_consumed,
            }))
            .collect::<Vec<_>>(),
    })
}
