//! HTTP handlers for stock count adjustments

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::adjustment::{CreateAdjustmentInput, UpdateAdjustmentInput};
use crate::services::document::DocumentFilter;
use crate::services::AdjustmentService;
use crate::AppState;
use shared::Adjustment;

pub async fn create_adjustment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateAdjustmentInput>,
) -> AppResult<(StatusCode, Json<Adjustment>)> {
    let adjustment = AdjustmentService::new(state.db)
        .create(&current_user.0, input)
        .await?;
    Ok((StatusCode::CREATED, Json(adjustment)))
}

pub async fn list_adjustments(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<DocumentFilter>,
) -> AppResult<Json<Vec<Adjustment>>> {
    let adjustments = AdjustmentService::new(state.db)
        .list(&current_user.0, filter)
        .await?;
    Ok(Json(adjustments))
}

pub async fn get_adjustment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(adjustment_id): Path<Uuid>,
) -> AppResult<Json<Adjustment>> {
    let adjustment = AdjustmentService::new(state.db)
        .get(&current_user.0, adjustment_id)
        .await?;
    Ok(Json(adjustment))
}

pub async fn update_adjustment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(adjustment_id): Path<Uuid>,
    Json(input): Json<UpdateAdjustmentInput>,
) -> AppResult<Json<Adjustment>> {
    let adjustment = AdjustmentService::new(state.db)
        .update(&current_user.0, adjustment_id, input)
        .await?;
    Ok(Json(adjustment))
}

pub async fn validate_adjustment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(adjustment_id): Path<Uuid>,
) -> AppResult<Json<Adjustment>> {
    let adjustment = AdjustmentService::new(state.db)
        .validate(&current_user.0, adjustment_id)
        .await?;
    Ok(Json(adjustment))
}

pub async fn cancel_adjustment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(adjustment_id): Path<Uuid>,
) -> AppResult<Json<Adjustment>> {
    let adjustment = AdjustmentService::new(state.db)
        .cancel(&current_user.0, adjustment_id)
        .await?;
    Ok(Json(adjustment))
}
