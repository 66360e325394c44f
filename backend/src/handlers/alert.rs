//! HTTP handlers for low stock alerts

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::alert::{AlertFilter, GenerationSummary};
use crate::services::AlertService;
use crate::AppState;
use shared::Alert;

pub async fn list_alerts(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<AlertFilter>,
) -> AppResult<Json<Vec<Alert>>> {
    let alerts = AlertService::new(state.db).list(filter).await?;
    Ok(Json(alerts))
}

/// Run a scan over the catalog now
pub async fn generate_alerts(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<GenerationSummary>> {
    let summary = AlertService::new(state.db).generate().await?;
    Ok(Json(summary))
}

pub async fn acknowledge_alert(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(alert_id): Path<Uuid>,
) -> AppResult<Json<Alert>> {
    let alert = AlertService::new(state.db)
        .acknowledge(&current_user.0, alert_id)
        .await?;
    Ok(Json(alert))
}

pub async fn resolve_alert(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(alert_id): Path<Uuid>,
) -> AppResult<Json<Alert>> {
    let alert = AlertService::new(state.db)
        .resolve(&current_user.0, alert_id)
        .await?;
    Ok(Json(alert))
}
