//! Warehouse and location handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::warehouse::{
    CreateLocationInput, CreateWarehouseInput, UpdateLocationInput, UpdateWarehouseInput,
};
use crate::services::WarehouseService;
use crate::AppState;
use shared::{Location, Warehouse};

pub async fn create_warehouse(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateWarehouseInput>,
) -> AppResult<(StatusCode, Json<Warehouse>)> {
    current_user.0.require_catalog_manager()?;
    let warehouse = WarehouseService::new(state.db).create(input).await?;
    Ok((StatusCode::CREATED, Json(warehouse)))
}

pub async fn list_warehouses(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Warehouse>>> {
    let warehouses = WarehouseService::new(state.db).list(&current_user.0).await?;
    Ok(Json(warehouses))
}

pub async fn get_warehouse(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<Warehouse>> {
    let warehouse = WarehouseService::new(state.db)
        .get(&current_user.0, warehouse_id)
        .await?;
    Ok(Json(warehouse))
}

pub async fn update_warehouse(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(warehouse_id): Path<Uuid>,
    Json(input): Json<UpdateWarehouseInput>,
) -> AppResult<Json<Warehouse>> {
    current_user.0.require_catalog_manager()?;
    let warehouse = WarehouseService::new(state.db)
        .update(warehouse_id, input)
        .await?;
    Ok(Json(warehouse))
}

/// Shorthand for `PUT` with `is_active = false`
pub async fn deactivate_warehouse(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<Warehouse>> {
    current_user.0.require_catalog_manager()?;
    let input = UpdateWarehouseInput {
        name: None,
        address: None,
        is_active: Some(false),
    };
    let warehouse = WarehouseService::new(state.db)
        .update(warehouse_id, input)
        .await?;
    Ok(Json(warehouse))
}

pub async fn create_location(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(warehouse_id): Path<Uuid>,
    Json(input): Json<CreateLocationInput>,
) -> AppResult<(StatusCode, Json<Location>)> {
    current_user.0.require_catalog_manager()?;
    let location = WarehouseService::new(state.db)
        .create_location(warehouse_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(location)))
}

pub async fn list_locations(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<Vec<Location>>> {
    let locations = WarehouseService::new(state.db)
        .list_locations(&current_user.0, warehouse_id)
        .await?;
    Ok(Json(locations))
}

pub async fn update_location(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((warehouse_id, location_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateLocationInput>,
) -> AppResult<Json<Location>> {
    current_user.0.require_catalog_manager()?;
    let location = WarehouseService::new(state.db)
        .update_location(warehouse_id, location_id, input)
        .await?;
    Ok(Json(location))
}

pub async fn deactivate_location(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((warehouse_id, location_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Location>> {
    current_user.0.require_catalog_manager()?;
    let input = UpdateLocationInput {
        name: None,
        is_active: Some(false),
    };
    let location = WarehouseService::new(state.db)
        .update_location(warehouse_id, location_id, input)
        .await?;
    Ok(Json(location))
}
