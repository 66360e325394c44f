//! Warehouse and location service

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use shared::{normalize_code, validate_code, Location, Warehouse};

#[derive(Clone)]
pub struct WarehouseService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct WarehouseRow {
    id: Uuid,
    code: String,
    name: String,
    address: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WarehouseRow> for Warehouse {
    fn from(row: WarehouseRow) -> Self {
        Warehouse {
            id: row.id,
            code: row.code,
            name: row.name,
            address: row.address,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LocationRow {
    id: Uuid,
    warehouse_id: Uuid,
    code: String,
    name: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Location {
            id: row.id,
            warehouse_id: row.warehouse_id,
            code: row.code,
            name: row.name,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWarehouseInput {
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateWarehouseInput {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLocationInput {
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLocationInput {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

const WAREHOUSE_COLUMNS: &str = "id, code, name, address, is_active, created_at, updated_at";
const LOCATION_COLUMNS: &str = "id, warehouse_id, code, name, is_active, created_at, updated_at";

fn checked_code(raw: &str) -> AppResult<String> {
    let code = normalize_code(raw);
    validate_code(&code).map_err(|msg| AppError::validation("code", msg))?;
    Ok(code)
}

/// Stock one product still holds somewhere being deactivated
#[derive(Debug, sqlx::FromRow)]
struct HeldStock {
    sku: String,
    quantity: i64,
}

/// Stock at an inactive place could never be moved again, so the place must be empty
fn ensure_empty(place: &str, held: &[HeldStock]) -> AppResult<()> {
    if held.is_empty() {
        return Ok(());
    }
    let listed: Vec<String> = held
        .iter()
        .map(|h| format!("{} ({})", h.sku, h.quantity))
        .collect();
    Err(AppError::InvalidState(format!(
        "{} still holds stock: {}",
        place,
        listed.join(", ")
    )))
}

/// Stock held across every location of a warehouse
async fn stock_in_warehouse(conn: &mut PgConnection, warehouse_id: Uuid) -> AppResult<Vec<HeldStock>> {
    Ok(sqlx::query_as::<_, HeldStock>(
        r#"
        SELECT p.sku, SUM((p.stock_by_location ->> l.id::text)::BIGINT)::BIGINT AS quantity
        FROM products p
        JOIN locations l ON p.stock_by_location ? l.id::text
        WHERE l.warehouse_id = $1
        GROUP BY p.sku
        ORDER BY p.sku
        "#,
    )
    .bind(warehouse_id)
    .fetch_all(&mut *conn)
    .await?)
}

async fn stock_at_location(conn: &mut PgConnection, location_id: Uuid) -> AppResult<Vec<HeldStock>> {
    Ok(sqlx::query_as::<_, HeldStock>(
        r#"
        SELECT sku, (stock_by_location ->> $1)::BIGINT AS quantity
        FROM products
        WHERE stock_by_location ? $1
        ORDER BY sku
        "#,
    )
    .bind(location_id.to_string())
    .fetch_all(&mut *conn)
    .await?)
}

impl WarehouseService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Warehouses
    // ========================================================================

    pub async fn create(&self, input: CreateWarehouseInput) -> AppResult<Warehouse> {
        input.validate()?;
        let code = checked_code(&input.code)?;

        let row = sqlx::query_as::<_, WarehouseRow>(&format!(
            r#"
            INSERT INTO warehouses (code, name, address)
            VALUES ($1, $2, $3)
            RETURNING {WAREHOUSE_COLUMNS}
            "#
        ))
        .bind(&code)
        .bind(input.name.trim())
        .bind(input.address.as_deref().map(str::trim))
        .fetch_one(&self.db)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict(format!("Warehouse {} already exists", code)),
            other => other,
        })?;

        tracing::info!(code = %row.code, "Warehouse created");
        Ok(row.into())
    }

    /// Warehouse staff only see their own warehouse
    pub async fn list(&self, user: &AuthUser) -> AppResult<Vec<Warehouse>> {
        let rows = sqlx::query_as::<_, WarehouseRow>(&format!(
            r#"
            SELECT {WAREHOUSE_COLUMNS} FROM warehouses
            WHERE ($1::uuid IS NULL OR id = $1)
            ORDER BY code
            "#
        ))
        .bind(user.scoped_warehouse())
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Warehouse::from).collect())
    }

    pub async fn get(&self, user: &AuthUser, warehouse_id: Uuid) -> AppResult<Warehouse> {
        user.ensure_warehouse(warehouse_id)?;

        sqlx::query_as::<_, WarehouseRow>(&format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = $1"
        ))
        .bind(warehouse_id)
        .fetch_optional(&self.db)
        .await?
        .map(Warehouse::from)
        .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))
    }

    /// Update name, address or the active flag; `is_active = false` deactivates
    /// and is refused while any of its locations holds stock
    pub async fn update(&self, warehouse_id: Uuid, input: UpdateWarehouseInput) -> AppResult<Warehouse> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let code = sqlx::query_scalar::<_, String>(
            "SELECT code FROM warehouses WHERE id = $1 FOR UPDATE",
        )
        .bind(warehouse_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))?;

        if input.is_active == Some(false) {
            // Postings share-lock their locations, so none can land after this check
            sqlx::query("SELECT id FROM locations WHERE warehouse_id = $1 FOR UPDATE")
                .bind(warehouse_id)
                .execute(&mut *tx)
                .await?;
            let held = stock_in_warehouse(&mut tx, warehouse_id).await?;
            ensure_empty(&format!("Warehouse {}", code), &held)?;
        }

        let row = sqlx::query_as::<_, WarehouseRow>(&format!(
            r#"
            UPDATE warehouses SET
                name = COALESCE($2, name),
                address = COALESCE($3, address),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {WAREHOUSE_COLUMNS}
            "#
        ))
        .bind(warehouse_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.address.as_deref().map(str::trim))
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(code = %row.code, active = row.is_active, "Warehouse updated");
        Ok(row.into())
    }

    // ========================================================================
    // Locations
    // ========================================================================

    pub async fn create_location(
        &self,
        warehouse_id: Uuid,
        input: CreateLocationInput,
    ) -> AppResult<Location> {
        input.validate()?;
        let code = checked_code(&input.code)?;

        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = $1)")
            .bind(warehouse_id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Err(AppError::NotFound("Warehouse".to_string()));
        }

        let row = sqlx::query_as::<_, LocationRow>(&format!(
            r#"
            INSERT INTO locations (warehouse_id, code, name)
            VALUES ($1, $2, $3)
            RETURNING {LOCATION_COLUMNS}
            "#
        ))
        .bind(warehouse_id)
        .bind(&code)
        .bind(input.name.trim())
        .fetch_one(&self.db)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict(format!("Location {} already exists in this warehouse", code))
            }
            other => other,
        })?;

        tracing::info!(code = %row.code, warehouse_id = %warehouse_id, "Location created");
        Ok(row.into())
    }

    pub async fn list_locations(&self, user: &AuthUser, warehouse_id: Uuid) -> AppResult<Vec<Location>> {
        // 404 for unknown warehouses rather than an empty list
        self.get(user, warehouse_id).await?;

        let rows = sqlx::query_as::<_, LocationRow>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE warehouse_id = $1 ORDER BY code"
        ))
        .bind(warehouse_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Location::from).collect())
    }

    /// Update name or the active flag; a location holding stock cannot be deactivated
    pub async fn update_location(
        &self,
        warehouse_id: Uuid,
        location_id: Uuid,
        input: UpdateLocationInput,
    ) -> AppResult<Location> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let code = sqlx::query_scalar::<_, String>(
            "SELECT code FROM locations WHERE id = $2 AND warehouse_id = $1 FOR UPDATE",
        )
        .bind(warehouse_id)
        .bind(location_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Location".to_string()))?;

        if input.is_active == Some(false) {
            let held = stock_at_location(&mut tx, location_id).await?;
            ensure_empty(&format!("Location {}", code), &held)?;
        }

        let row = sqlx::query_as::<_, LocationRow>(&format!(
            r#"
            UPDATE locations SET
                name = COALESCE($3, name),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
            WHERE id = $2 AND warehouse_id = $1
            RETURNING {LOCATION_COLUMNS}
            "#
        ))
        .bind(warehouse_id)
        .bind(location_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(code = %row.code, active = row.is_active, "Location updated");
        Ok(row.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_code() {
        assert_eq!(checked_code(" wh-1 ").unwrap(), "WH-1");
        assert!(checked_code("").is_err());
        assert!(checked_code("shelf 1").is_err());
    }

    #[test]
    fn test_empty_place_can_be_deactivated() {
        assert!(ensure_empty("Location A-01", &[]).is_ok());
    }

    #[test]
    fn test_place_holding_stock_cannot_be_deactivated() {
        let held = vec![
            HeldStock { sku: "WID-01".to_string(), quantity: 5 },
            HeldStock { sku: "WID-02".to_string(), quantity: 1 },
        ];
        let err = ensure_empty("Location A-01", &held).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        match err {
            AppError::InvalidState(msg) => {
                assert_eq!(msg, "Location A-01 still holds stock: WID-01 (5), WID-02 (1)")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
