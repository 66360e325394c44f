//! HTTP handlers for the product catalog

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::product::{CreateProductInput, ProductFilter, UpdateProductInput};
use crate::services::ProductService;
use crate::AppState;
use shared::{LocationStock, Product};

pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    current_user.0.require_catalog_manager()?;
    let product = ProductService::new(state.db).create(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// List products; `?low_stock=true` keeps those at or below their reorder level
pub async fn list_products(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Vec<Product>>> {
    let products = ProductService::new(state.db).list(filter).await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let product = ProductService::new(state.db).get(product_id).await?;
    Ok(Json(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    current_user.0.require_catalog_manager()?;
    let product = ProductService::new(state.db).update(product_id, input).await?;
    Ok(Json(product))
}

pub async fn archive_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    current_user.0.require_catalog_manager()?;
    let product = ProductService::new(state.db).archive(product_id).await?;
    Ok(Json(product))
}

pub async fn get_product_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Vec<LocationStock>>> {
    let stock = ProductService::new(state.db)
        .stock_by_location(&current_user.0, product_id)
        .await?;
    Ok(Json(stock))
}
