//! HTTP handlers for incoming receipts

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::document::DocumentFilter;
use crate::services::receipt::{CreateReceiptInput, UpdateReceiptInput};
use crate::services::ReceiptService;
use crate::AppState;
use shared::Receipt;

pub async fn create_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateReceiptInput>,
) -> AppResult<(StatusCode, Json<Receipt>)> {
    let receipt = ReceiptService::new(state.db)
        .create(&current_user.0, input)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_receipts(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<DocumentFilter>,
) -> AppResult<Json<Vec<Receipt>>> {
    let receipts = ReceiptService::new(state.db)
        .list(&current_user.0, filter)
        .await?;
    Ok(Json(receipts))
}

pub async fn get_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(receipt_id): Path<Uuid>,
) -> AppResult<Json<Receipt>> {
    let receipt = ReceiptService::new(state.db)
        .get(&current_user.0, receipt_id)
        .await?;
    Ok(Json(receipt))
}

pub async fn update_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(receipt_id): Path<Uuid>,
    Json(input): Json<UpdateReceiptInput>,
) -> AppResult<Json<Receipt>> {
    let receipt = ReceiptService::new(state.db)
        .update(&current_user.0, receipt_id, input)
        .await?;
    Ok(Json(receipt))
}

/// Post every line into stock and mark the receipt done
pub async fn validate_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(receipt_id): Path<Uuid>,
) -> AppResult<Json<Receipt>> {
    let receipt = ReceiptService::new(state.db)
        .validate(&current_user.0, receipt_id)
        .await?;
    Ok(Json(receipt))
}

pub async fn cancel_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(receipt_id): Path<Uuid>,
) -> AppResult<Json<Receipt>> {
    let receipt = ReceiptService::new(state.db)
        .cancel(&current_user.0, receipt_id)
        .await?;
    Ok(Json(receipt))
}
