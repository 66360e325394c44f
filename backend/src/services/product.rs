//! Product catalog service
//!
//! Catalog writes only ever touch metadata. Stock columns change through the
//! movement services alone.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use shared::stock::StockMap;
use shared::{
    normalize_sku, validate_reorder_settings, validate_sku, LocationStock, Product, ProductStatus,
};

#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    category: Option<String>,
    unit_of_measure: String,
    stock_by_location: Json<StockMap>,
    total_stock: i64,
    reorder_level: i64,
    reorder_quantity: i64,
    max_stock: Option<i64>,
    unit_cost: Option<Decimal>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self) -> AppResult<Product> {
        let status = ProductStatus::from_str(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown product status '{}'", self.status)))?;
        Ok(Product {
            id: self.id,
            sku: self.sku,
            name: self.name,
            category: self.category,
            unit_of_measure: self.unit_of_measure,
            stock_by_location: self.stock_by_location.0,
            total_stock: self.total_stock,
            reorder_level: self.reorder_level,
            reorder_quantity: self.reorder_quantity,
            max_stock: self.max_stock,
            unit_cost: self.unit_cost,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    pub sku: String,
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    #[validate(length(max = 100, message = "Category must be at most 100 characters"))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 32, message = "Unit of measure must be 1-32 characters"))]
    pub unit_of_measure: Option<String>,
    pub reorder_level: Option<i64>,
    pub reorder_quantity: Option<i64>,
    pub max_stock: Option<i64>,
    pub unit_cost: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductInput {
    pub sku: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 100, message = "Category must be at most 100 characters"))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 32, message = "Unit of measure must be 1-32 characters"))]
    pub unit_of_measure: Option<String>,
    pub reorder_level: Option<i64>,
    pub reorder_quantity: Option<i64>,
    pub max_stock: Option<i64>,
    pub unit_cost: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    /// Matches name or SKU, case-insensitive
    pub search: Option<String>,
    pub status: Option<ProductStatus>,
    /// Only products at or below their reorder level
    #[serde(default)]
    pub low_stock: bool,
}

const PRODUCT_COLUMNS: &str = "id, sku, name, category, unit_of_measure, stock_by_location, \
     total_stock, reorder_level, reorder_quantity, max_stock, unit_cost, status, created_at, \
     updated_at";

fn checked_sku(raw: &str) -> AppResult<String> {
    let sku = normalize_sku(raw);
    validate_sku(&sku).map_err(|msg| AppError::validation("sku", msg))?;
    Ok(sku)
}

fn check_unit_cost(unit_cost: Option<Decimal>) -> AppResult<()> {
    match unit_cost {
        Some(cost) if cost.is_sign_negative() => {
            Err(AppError::validation("unit_cost", "Unit cost cannot be negative"))
        }
        _ => Ok(()),
    }
}

impl ProductService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// New products start with no stock anywhere
    pub async fn create(&self, input: CreateProductInput) -> AppResult<Product> {
        input.validate()?;
        let sku = checked_sku(&input.sku)?;
        let reorder_level = input.reorder_level.unwrap_or(0);
        let reorder_quantity = input.reorder_quantity.unwrap_or(0);
        validate_reorder_settings(reorder_level, reorder_quantity, input.max_stock)
            .map_err(|msg| AppError::validation("reorder_level", msg))?;
        check_unit_cost(input.unit_cost)?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO products (
                sku, name, category, unit_of_measure, reorder_level, reorder_quantity,
                max_stock, unit_cost
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&sku)
        .bind(input.name.trim())
        .bind(input.category.as_deref().map(str::trim))
        .bind(input.unit_of_measure.as_deref().unwrap_or("unit"))
        .bind(reorder_level)
        .bind(reorder_quantity)
        .bind(input.max_stock)
        .bind(input.unit_cost)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict(format!("SKU {} already exists", sku)),
            other => other,
        })?;

        tracing::info!(sku = %row.sku, "Product created");
        row.into_product()
    }

    pub async fn list(&self, filter: ProductFilter) -> AppResult<Vec<Product>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR sku ILIKE $2)
              AND ($3::text IS NULL OR status = $3)
              AND (NOT $4 OR total_stock <= reorder_level)
            ORDER BY sku
            "#
        ))
        .bind(filter.category.as_deref())
        .bind(search)
        .bind(filter.status.as_ref().map(ProductStatus::as_str))
        .bind(filter.low_stock)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(ProductRow::into_product)
        .collect()
    }

    pub async fn get(&self, product_id: Uuid) -> AppResult<Product> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?
        .into_product()
    }

    /// Update metadata; stock is never changed here
    pub async fn update(&self, product_id: Uuid, input: UpdateProductInput) -> AppResult<Product> {
        input.validate()?;
        let sku = input.sku.as_deref().map(checked_sku).transpose()?;
        check_unit_cost(input.unit_cost)?;

        let mut tx = self.db.begin().await?;

        let current = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let reorder_level = input.reorder_level.unwrap_or(current.reorder_level);
        let reorder_quantity = input.reorder_quantity.unwrap_or(current.reorder_quantity);
        let max_stock = input.max_stock.or(current.max_stock);
        validate_reorder_settings(reorder_level, reorder_quantity, max_stock)
            .map_err(|msg| AppError::validation("reorder_level", msg))?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE products SET
                sku = COALESCE($2, sku),
                name = COALESCE($3, name),
                category = COALESCE($4, category),
                unit_of_measure = COALESCE($5, unit_of_measure),
                reorder_level = $6,
                reorder_quantity = $7,
                max_stock = $8,
                unit_cost = COALESCE($9, unit_cost),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id)
        .bind(sku)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.category.as_deref().map(str::trim))
        .bind(input.unit_of_measure.as_deref())
        .bind(reorder_level)
        .bind(reorder_quantity)
        .bind(max_stock)
        .bind(input.unit_cost)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(sku = %row.sku, "Product updated");
        row.into_product()
    }

    /// Soft delete; the product stays for the ledger
    pub async fn archive(&self, product_id: Uuid) -> AppResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE products SET status = 'archived', updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => {
                tracing::info!(sku = %row.sku, "Product archived");
                row.into_product()
            }
            None => {
                // distinguish unknown from already archived
                let product = self.get(product_id).await?;
                Err(AppError::InvalidState(format!(
                    "Product {} is already archived",
                    product.sku
                )))
            }
        }
    }

    /// Per-location stock with warehouse and location codes
    pub async fn stock_by_location(
        &self,
        user: &AuthUser,
        product_id: Uuid,
    ) -> AppResult<Vec<LocationStock>> {
        let product = self.get(product_id).await?;

        let quantities: HashMap<Uuid, i64> = product
            .stock_by_location
            .iter()
            .filter_map(|(key, quantity)| match Uuid::parse_str(key) {
                Ok(location_id) => Some((location_id, quantity)),
                Err(_) => {
                    tracing::warn!(sku = %product.sku, key, "Ignoring malformed stock key");
                    None
                }
            })
            .collect();
        let location_ids: Vec<Uuid> = quantities.keys().copied().collect();

        let rows = sqlx::query_as::<_, (Uuid, String, Uuid, String)>(
            r#"
            SELECT w.id, w.code, l.id, l.code
            FROM locations l
            JOIN warehouses w ON w.id = l.warehouse_id
            WHERE l.id = ANY($1)
            ORDER BY w.code, l.code
            "#,
        )
        .bind(&location_ids)
        .fetch_all(&self.db)
        .await?;

        let scope = user.scoped_warehouse();
        Ok(rows
            .into_iter()
            .filter(|(warehouse_id, _, _, _)| scope.map_or(true, |own| own == *warehouse_id))
            .map(
                |(warehouse_id, warehouse_code, location_id, location_code)| LocationStock {
                    warehouse_id,
                    warehouse_code,
                    location_id,
                    location_code,
                    quantity: quantities.get(&location_id).copied().unwrap_or(0),
                },
            )
            .collect())
    }
}
