use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use rxstock_infra::{LogQuery, Pagination, SnapshotQuery, SnapshotSort, SortOrder, DEFAULT_PAGE_SIZE};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/snapshot", get(snapshot))
        .route("/logs", get(logs))
        .route("/medicines", get(medicines))
}

pub async fn snapshot(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::SnapshotParams>,
) -> axum::response::Response {
    let sort_by = match params.sort_by.as_deref().map(str::parse::<SnapshotSort>).transpose() {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return errors::domain_error_to_response(e),
    };
    let order = match params.sort_order.as_deref().map(str::parse::<SortOrder>).transpose() {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return errors::domain_error_to_response(e),
    };

    let query = SnapshotQuery {
        name: params.name,
        sort_by,
        order,
    };
    match services.ledger.snapshot(query).await {
        Ok(records) => {
            let items: Vec<_> = records
                .iter()
                .map(|r| dto::item_to_json(&r.item, r.quantity))
                .collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn logs(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::LogParams>,
) -> axum::response::Response {
    let item_id = match params.item_id.as_deref().map(dto::parse_item_id).transpose() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let reason = match params.reason_code.as_deref().map(dto::parse_reason).transpose() {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let query = LogQuery {
        item_id,
        reason,
        from: params.from,
        to: params.to,
    };
    let pagination = Pagination::new(
        params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        params.offset.unwrap_or(0),
    );
    match services.ledger.query_logs(query, pagination).await {
        Ok(result) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "entries": result.entries.iter().map(dto::log_entry_to_json).collect::<Vec<_>>(),
                "total": result.total,
                "limit": result.pagination.limit,
                "offset": result.pagination.offset,
                "has_more": result.has_more,
            })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn medicines(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::MedicineParams>,
) -> axum::response::Response {
    match services
        .ledger
        .medicine_overview(params.name.as_deref(), Utc::now())
        .await
    {
        Ok(overviews) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "medicines": overviews.iter().map(dto::overview_to_json).collect::<Vec<_>>(),
            })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
