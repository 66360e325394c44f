//! Adjustment service: physical counts reconciled into stock
//!
//! The difference stored at creation is informational. Validation re-reads
//! the locked stock and posts `counted - current`, rewriting the stored
//! system quantity and difference to the values actually posted.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::document::{clean_text, parse_status, DocumentFilter};
use crate::services::ledger::DocumentRef;
use crate::services::stock;
use shared::posting::{plan_adjustment, CountLine};
use shared::{Adjustment, DocumentKind, DocumentStatus};

const KIND: DocumentKind = DocumentKind::Adjustment;

#[derive(Clone)]
pub struct AdjustmentService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct AdjustmentRow {
    id: Uuid,
    number: String,
    status: String,
    warehouse_id: Uuid,
    location_id: Uuid,
    product_id: Uuid,
    counted_quantity: i64,
    system_quantity: i64,
    difference: i64,
    reason: Option<String>,
    created_by: Uuid,
    validated_by: Option<Uuid>,
    validated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AdjustmentRow {
    fn status(&self) -> AppResult<DocumentStatus> {
        parse_status(KIND, &self.status)
    }

    fn into_adjustment(self) -> AppResult<Adjustment> {
        Ok(Adjustment {
            status: self.status()?,
            id: self.id,
            number: self.number,
            warehouse_id: self.warehouse_id,
            location_id: self.location_id,
            product_id: self.product_id,
            counted_quantity: self.counted_quantity,
            system_quantity: self.system_quantity,
            difference: self.difference,
            reason: self.reason,
            created_by: self.created_by,
            validated_by: self.validated_by,
            validated_at: self.validated_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAdjustmentInput {
    pub warehouse_id: Uuid,
    pub location_id: Uuid,
    pub product_id: Uuid,
    #[validate(range(min = 0, message = "Counted quantity cannot be negative"))]
    pub counted_quantity: i64,
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAdjustmentInput {
    #[validate(range(min = 0, message = "Counted quantity cannot be negative"))]
    pub counted_quantity: Option<i64>,
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

const ADJUSTMENT_COLUMNS: &str = "id, number, status, warehouse_id, location_id, product_id, \
     counted_quantity, system_quantity, difference, reason, created_by, validated_by, \
     validated_at, created_at, updated_at";

async fn lock_adjustment(conn: &mut PgConnection, adjustment_id: Uuid) -> AppResult<AdjustmentRow> {
    sqlx::query_as::<_, AdjustmentRow>(&format!(
        "SELECT {ADJUSTMENT_COLUMNS} FROM adjustments WHERE id = $1 FOR UPDATE"
    ))
    .bind(adjustment_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Adjustment".to_string()))
}

impl AdjustmentService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record a count; the current stock is captured as the system quantity
    pub async fn create(
        &self,
        user: &AuthUser,
        input: CreateAdjustmentInput,
    ) -> AppResult<Adjustment> {
        input.validate()?;
        user.ensure_warehouse(input.warehouse_id)?;

        let mut tx = self.db.begin().await?;
        stock::ensure_warehouse_active(&mut tx, input.warehouse_id).await?;
        stock::verify_locations(&mut tx, input.warehouse_id, [input.location_id]).await?;
        stock::ensure_products_active(&mut tx, [input.product_id]).await?;

        let system_quantity =
            stock::current_quantity(&mut tx, input.product_id, input.location_id).await?;
        let difference = input.counted_quantity - system_quantity;

        let number = stock::next_document_number(&mut tx, KIND).await?;
        let row = sqlx::query_as::<_, AdjustmentRow>(&format!(
            r#"
            INSERT INTO adjustments (
                number, warehouse_id, location_id, product_id, counted_quantity,
                system_quantity, difference, reason, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ADJUSTMENT_COLUMNS}
            "#
        ))
        .bind(&number)
        .bind(input.warehouse_id)
        .bind(input.location_id)
        .bind(input.product_id)
        .bind(input.counted_quantity)
        .bind(system_quantity)
        .bind(difference)
        .bind(clean_text(input.reason))
        .bind(user.user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(adjustment = %number, difference, "Adjustment created");
        row.into_adjustment()
    }

    pub async fn list(&self, user: &AuthUser, filter: DocumentFilter) -> AppResult<Vec<Adjustment>> {
        let warehouse_id = filter.warehouse_for(user)?;

        sqlx::query_as::<_, AdjustmentRow>(&format!(
            r#"
            SELECT {ADJUSTMENT_COLUMNS} FROM adjustments
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR warehouse_id = $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(filter.status_str())
        .bind(warehouse_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(AdjustmentRow::into_adjustment)
        .collect()
    }

    pub async fn get(&self, user: &AuthUser, adjustment_id: Uuid) -> AppResult<Adjustment> {
        let row = sqlx::query_as::<_, AdjustmentRow>(&format!(
            "SELECT {ADJUSTMENT_COLUMNS} FROM adjustments WHERE id = $1"
        ))
        .bind(adjustment_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Adjustment".to_string()))?;

        user.ensure_warehouse(row.warehouse_id)?;
        row.into_adjustment()
    }

    /// A new count recaptures the system quantity and difference
    pub async fn update(
        &self,
        user: &AuthUser,
        adjustment_id: Uuid,
        input: UpdateAdjustmentInput,
    ) -> AppResult<Adjustment> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let current = lock_adjustment(&mut tx, adjustment_id).await?;
        user.ensure_warehouse(current.warehouse_id)?;
        KIND.ensure_editable(current.status()?)?;

        let (counted, system) = match input.counted_quantity {
            Some(counted) => {
                let system =
                    stock::current_quantity(&mut tx, current.product_id, current.location_id)
                        .await?;
                (counted, system)
            }
            None => (current.counted_quantity, current.system_quantity),
        };

        let row = sqlx::query_as::<_, AdjustmentRow>(&format!(
            r#"
            UPDATE adjustments SET
                counted_quantity = $2,
                system_quantity = $3,
                difference = $4,
                reason = COALESCE($5, reason),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ADJUSTMENT_COLUMNS}
            "#
        ))
        .bind(adjustment_id)
        .bind(counted)
        .bind(system)
        .bind(counted - system)
        .bind(clean_text(input.reason))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(adjustment = %current.number, "Adjustment updated");
        row.into_adjustment()
    }

    /// Set the location to the counted quantity and post the difference
    pub async fn validate(&self, user: &AuthUser, adjustment_id: Uuid) -> AppResult<Adjustment> {
        let mut tx = self.db.begin().await?;

        let header = lock_adjustment(&mut tx, adjustment_id).await?;
        user.ensure_warehouse(header.warehouse_id)?;
        KIND.transition(header.status()?, DocumentStatus::Done)?;

        stock::ensure_warehouse_active(&mut tx, header.warehouse_id).await?;
        stock::verify_locations(&mut tx, header.warehouse_id, [header.location_id]).await?;

        let mut book = stock::lock_products(&mut tx, [header.product_id]).await?;
        let posting = plan_adjustment(
            header.warehouse_id,
            CountLine {
                product_id: header.product_id,
                location_id: header.location_id,
                counted_quantity: header.counted_quantity,
            },
            &mut book,
        )?;

        if posting.quantity_before != header.system_quantity {
            tracing::warn!(
                adjustment = %header.number,
                recorded = header.system_quantity,
                current = posting.quantity_before,
                "Stock moved since the count was recorded; difference re-derived"
            );
        }

        let document = DocumentRef {
            kind: KIND,
            id: header.id,
            number: header.number.clone(),
        };
        stock::record_postings(
            &mut tx,
            &book,
            &document,
            user.user_id,
            std::slice::from_ref(&posting),
        )
        .await?;

        let row = sqlx::query_as::<_, AdjustmentRow>(&format!(
            r#"
            UPDATE adjustments SET
                status = 'done',
                system_quantity = $2,
                difference = $3,
                validated_by = $4,
                validated_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ADJUSTMENT_COLUMNS}
            "#
        ))
        .bind(adjustment_id)
        .bind(posting.quantity_before)
        .bind(posting.quantity)
        .bind(user.user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            adjustment = %header.number,
            lines = 1,
            postings = 1,
            difference = posting.quantity,
            "Adjustment validated"
        );
        row.into_adjustment()
    }

    pub async fn cancel(&self, user: &AuthUser, adjustment_id: Uuid) -> AppResult<Adjustment> {
        let mut tx = self.db.begin().await?;

        let header = lock_adjustment(&mut tx, adjustment_id).await?;
        user.ensure_warehouse(header.warehouse_id)?;
        KIND.transition(header.status()?, DocumentStatus::Canceled)?;

        let row = sqlx::query_as::<_, AdjustmentRow>(&format!(
            r#"
            UPDATE adjustments SET status = 'canceled', updated_at = NOW()
            WHERE id = $1
            RETURNING {ADJUSTMENT_COLUMNS}
            "#
        ))
        .bind(adjustment_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(adjustment = %header.number, "Adjustment canceled");
        row.into_adjustment()
    }
}
