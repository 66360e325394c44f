//! HTTP handlers for internal transfers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::document::DocumentFilter;
use crate::services::transfer::{CreateTransferInput, UpdateTransferInput};
use crate::services::TransferService;
use crate::AppState;
use shared::Transfer;

pub async fn create_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateTransferInput>,
) -> AppResult<(StatusCode, Json<Transfer>)> {
    let transfer = TransferService::new(state.db)
        .create(&current_user.0, input)
        .await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

/// `warehouse_id` matches either end of the route
pub async fn list_transfers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<DocumentFilter>,
) -> AppResult<Json<Vec<Transfer>>> {
    let transfers = TransferService::new(state.db)
        .list(&current_user.0, filter)
        .await?;
    Ok(Json(transfers))
}

pub async fn get_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<Transfer>> {
    let transfer = TransferService::new(state.db)
        .get(&current_user.0, transfer_id)
        .await?;
    Ok(Json(transfer))
}

pub async fn update_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
    Json(input): Json<UpdateTransferInput>,
) -> AppResult<Json<Transfer>> {
    let transfer = TransferService::new(state.db)
        .update(&current_user.0, transfer_id, input)
        .await?;
    Ok(Json(transfer))
}

pub async fn execute_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<Transfer>> {
    let transfer = TransferService::new(state.db)
        .execute(&current_user.0, transfer_id)
        .await?;
    Ok(Json(transfer))
}

pub async fn cancel_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<Transfer>> {
    let transfer = TransferService::new(state.db)
        .cancel(&current_user.0, transfer_id)
        .await?;
    Ok(Json(transfer))
}
