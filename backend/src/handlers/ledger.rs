//! Read-only stock ledger handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::ledger::LedgerFilter;
use crate::services::LedgerService;
use crate::AppState;
use shared::{LedgerEntry, PaginatedResponse};

pub async fn list_ledger(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<LedgerFilter>,
) -> AppResult<Json<PaginatedResponse<LedgerEntry>>> {
    let service = LedgerService::new(state.db, &state.config.ledger);
    let page = service.list(&current_user.0, filter).await?;
    Ok(Json(page))
}

pub async fn product_ledger(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Query(filter): Query<LedgerFilter>,
) -> AppResult<Json<PaginatedResponse<LedgerEntry>>> {
    let service = LedgerService::new(state.db, &state.config.ledger);
    let page = service
        .by_product(&current_user.0, product_id, filter)
        .await?;
    Ok(Json(page))
}

pub async fn warehouse_ledger(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(warehouse_id): Path<Uuid>,
    Query(filter): Query<LedgerFilter>,
) -> AppResult<Json<PaginatedResponse<LedgerEntry>>> {
    let service = LedgerService::new(state.db, &state.config.ledger);
    let page = service
        .by_warehouse(&current_user.0, warehouse_id, filter)
        .await?;
    Ok(Json(page))
}
