use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use rxstock_ledger::{ItemPatch, NewItem};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_item))
        .route("/:id", get(get_item).put(update_item))
        .route("/:id/deactivate", post(deactivate_item))
        .route("/:id/adjustments", post(adjust_stock))
        .route("/:id/stock", put(set_stock))
        .route("/:id/disposal", post(dispose_item))
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateItemRequest>,
) -> axum::response::Response {
    let form = match dto::parse_form(&body.form) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let expiry = match dto::parse_expiry(body.expiry) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let draft = NewItem {
        name: body.name,
        description: body.description,
        form,
        expiry,
    };
    match services.ledger.create_item(draft).await {
        Ok(item) => (StatusCode::CREATED, Json(dto::item_to_json(&item, 0))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_id = match dto::parse_item_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let item = match services.ledger.item(item_id).await {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let level = match services.ledger.stock_level(item_id).await {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    (StatusCode::OK, Json(dto::item_to_json(&item, level.quantity))).into_response()
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateItemRequest>,
) -> axum::response::Response {
    let item_id = match dto::parse_item_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let form = match body.form.as_deref().map(dto::parse_form).transpose() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let expiry = match body.expiry.map(dto::parse_expiry).transpose() {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let patch = ItemPatch {
        name: body.name,
        description: body.description,
        form,
        expiry,
    };
    let item = match services.ledger.update_item(item_id, patch).await {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let level = match services.ledger.stock_level(item_id).await {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    (StatusCode::OK, Json(dto::item_to_json(&item, level.quantity))).into_response()
}

pub async fn deactivate_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_id = match dto::parse_item_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let item = match services.ledger.deactivate_item(item_id).await {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let level = match services.ledger.stock_level(item_id).await {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    (StatusCode::OK, Json(dto::item_to_json(&item, level.quantity))).into_response()
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let item_id = match dto::parse_item_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let reason = match dto::parse_reason(&body.reason_code) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .ledger
        .apply_adjustment(item_id, body.quantity_delta, reason, body.note, actor.actor_id())
        .await
    {
        Ok(entry) => (StatusCode::OK, Json(dto::log_entry_to_json(&entry))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn set_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetStockRequest>,
) -> axum::response::Response {
    let item_id = match dto::parse_item_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .ledger
        .set_quantity(item_id, body.target_quantity, actor.actor_id())
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "current_stock": outcome.quantity,
                "entry": outcome.entry.as_ref().map(dto::log_entry_to_json),
            })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn dispose_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::DisposeItemRequest>,
) -> axum::response::Response {
    let item_id = match dto::parse_item_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .ledger
        .dispose(item_id, &body.reason, actor.actor_id())
        .await
    {
        Ok(entry) => (StatusCode::OK, Json(dto::log_entry_to_json(&entry))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
