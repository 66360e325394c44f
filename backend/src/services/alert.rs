//! Low stock alert service
//!
//! Generation classifies every active product against its reorder level and
//! inserts at most one active alert per product. The partial unique index on
//! `alerts(product_id) WHERE status = 'Active'` backs the in-memory dedup.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use shared::{plan_alerts, Alert, AlertSeverity, AlertStatus, AlertType, StockLevel};

/// Alert service
#[derive(Clone)]
pub struct AlertService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct AlertRow {
    id: Uuid,
    product_id: Uuid,
    alert_type: String,
    severity: String,
    status: String,
    message: String,
    current_stock: i64,
    reorder_level: i64,
    suggested_quantity: Option<i64>,
    acknowledged_by: Option<Uuid>,
    acknowledged_at: Option<DateTime<Utc>>,
    resolved_by: Option<Uuid>,
    resolved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl AlertRow {
    fn status(&self) -> AppResult<AlertStatus> {
        AlertStatus::from_str(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown alert status '{}'", self.status)))
    }

    fn into_alert(self) -> AppResult<Alert> {
        let alert_type = AlertType::from_str(&self.alert_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown alert type '{}'", self.alert_type))
        })?;
        let severity = AlertSeverity::from_str(&self.severity).ok_or_else(|| {
            AppError::Internal(format!("Unknown alert severity '{}'", self.severity))
        })?;

        Ok(Alert {
            status: self.status()?,
            id: self.id,
            product_id: self.product_id,
            alert_type,
            severity,
            message: self.message,
            current_stock: self.current_stock,
            reorder_level: self.reorder_level,
            suggested_quantity: self.suggested_quantity,
            acknowledged_by: self.acknowledged_by,
            acknowledged_at: self.acknowledged_at,
            resolved_by: self.resolved_by,
            resolved_at: self.resolved_at,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockLevelRow {
    id: Uuid,
    sku: String,
    name: String,
    total_stock: i64,
    reorder_level: i64,
    reorder_quantity: i64,
    is_active: bool,
}

impl From<StockLevelRow> for StockLevel {
    fn from(row: StockLevelRow) -> Self {
        StockLevel {
            product_id: row.id,
            sku: row.sku,
            name: row.name,
            total_stock: row.total_stock,
            reorder_level: row.reorder_level,
            reorder_quantity: row.reorder_quantity,
            is_active: row.is_active,
        }
    }
}

/// Query filters for listing alerts
#[derive(Debug, Default, Deserialize)]
pub struct AlertFilter {
    pub status: Option<AlertStatus>,
    pub alert_type: Option<AlertType>,
    pub product_id: Option<Uuid>,
}

/// Outcome of a generation run
#[derive(Debug, serde::Serialize)]
pub struct GenerationSummary {
    pub scanned: usize,
    pub created: Vec<Alert>,
}

const ALERT_COLUMNS: &str = "id, product_id, alert_type, severity, status, message, \
     current_stock, reorder_level, suggested_quantity, acknowledged_by, acknowledged_at, \
     resolved_by, resolved_at, created_at";

async fn lock_alert(conn: &mut PgConnection, alert_id: Uuid) -> AppResult<AlertRow> {
    sqlx::query_as::<_, AlertRow>(&format!(
        "SELECT {ALERT_COLUMNS} FROM alerts WHERE id = $1 FOR UPDATE"
    ))
    .bind(alert_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Alert".to_string()))
}

impl AlertService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Scan all products and create alerts for those at or below their reorder level
    pub async fn generate(&self) -> AppResult<GenerationSummary> {
        let mut tx = self.db.begin().await?;

        let levels: Vec<StockLevel> = sqlx::query_as::<_, StockLevelRow>(
            r#"
            SELECT id, sku, name, total_stock, reorder_level, reorder_quantity,
                   status = 'active' AS is_active
            FROM products
            ORDER BY sku
            "#,
        )
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(StockLevel::from)
        .collect();

        let with_active_alert: HashSet<Uuid> = sqlx::query_scalar::<_, Uuid>(
            "SELECT product_id FROM alerts WHERE status = 'Active'",
        )
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();

        let planned = plan_alerts(&levels, &with_active_alert);
        let mut created = Vec::with_capacity(planned.len());

        for alert in &planned {
            // A concurrent run may have inserted first; the index turns that into a no-op
            let row = sqlx::query_as::<_, AlertRow>(&format!(
                r#"
                INSERT INTO alerts (
                    product_id, alert_type, severity, message,
                    current_stock, reorder_level, suggested_quantity
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (product_id) WHERE status = 'Active' DO NOTHING
                RETURNING {ALERT_COLUMNS}
                "#
            ))
            .bind(alert.product_id)
            .bind(alert.alert_type.as_str())
            .bind(alert.severity.as_str())
            .bind(&alert.message)
            .bind(alert.current_stock)
            .bind(alert.reorder_level)
            .bind(alert.suggested_quantity)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(row) = row {
                created.push(row.into_alert()?);
            }
        }

        tx.commit().await?;

        tracing::info!(
            scanned = levels.len(),
            planned = planned.len(),
            created = created.len(),
            "Alert generation finished"
        );

        Ok(GenerationSummary {
            scanned: levels.len(),
            created,
        })
    }

    pub async fn list(&self, filter: AlertFilter) -> AppResult<Vec<Alert>> {
        sqlx::query_as::<_, AlertRow>(&format!(
            r#"
            SELECT {ALERT_COLUMNS} FROM alerts
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR alert_type = $2)
              AND ($3::uuid IS NULL OR product_id = $3)
            ORDER BY created_at DESC
            "#
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.alert_type.map(|t| t.as_str()))
        .bind(filter.product_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(AlertRow::into_alert)
        .collect()
    }

    pub async fn acknowledge(&self, user: &AuthUser, alert_id: Uuid) -> AppResult<Alert> {
        user.require_alert_manager()?;

        let mut tx = self.db.begin().await?;
        let current = lock_alert(&mut tx, alert_id).await?;
        let next = current.status()?.acknowledge()?;

        let row = sqlx::query_as::<_, AlertRow>(&format!(
            r#"
            UPDATE alerts SET status = $2, acknowledged_by = $3, acknowledged_at = NOW()
            WHERE id = $1
            RETURNING {ALERT_COLUMNS}
            "#
        ))
        .bind(alert_id)
        .bind(next.as_str())
        .bind(user.user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(alert_id = %alert_id, user_id = %user.user_id, "Alert acknowledged");
        row.into_alert()
    }

    pub async fn resolve(&self, user: &AuthUser, alert_id: Uuid) -> AppResult<Alert> {
        user.require_alert_manager()?;

        let mut tx = self.db.begin().await?;
        let current = lock_alert(&mut tx, alert_id).await?;
        let next = current.status()?.resolve()?;

        let row = sqlx::query_as::<_, AlertRow>(&format!(
            r#"
            UPDATE alerts SET status = $2, resolved_by = $3, resolved_at = NOW()
            WHERE id = $1
            RETURNING {ALERT_COLUMNS}
            "#
        ))
        .bind(alert_id)
        .bind(next.as_str())
        .bind(user.user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(alert_id = %alert_id, user_id = %user.user_id, "Alert resolved");
        row.into_alert()
    }
}
