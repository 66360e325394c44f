//! Receipt service: incoming goods

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::document::{clean_text, parse_status, requested_status, DocumentFilter};
use crate::services::ledger::DocumentRef;
use crate::services::stock;
use shared::posting::{check_quantities, plan_receipt, StockLine};
use shared::{DocumentKind, DocumentStatus, Receipt, ReceiptItem};

const KIND: DocumentKind = DocumentKind::Receipt;

#[derive(Clone)]
pub struct ReceiptService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct ReceiptRow {
    id: Uuid,
    number: String,
    status: String,
    warehouse_id: Uuid,
    supplier: Option<String>,
    scheduled_date: Option<NaiveDate>,
    notes: Option<String>,
    created_by: Uuid,
    validated_by: Option<Uuid>,
    validated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ReceiptItemRow {
    id: Uuid,
    receipt_id: Uuid,
    product_id: Uuid,
    location_id: Uuid,
    quantity: i64,
}

impl ReceiptRow {
    fn status(&self) -> AppResult<DocumentStatus> {
        parse_status(KIND, &self.status)
    }

    fn into_receipt(self, items: Vec<ReceiptItemRow>) -> AppResult<Receipt> {
        Ok(Receipt {
            status: self.status()?,
            id: self.id,
            number: self.number,
            warehouse_id: self.warehouse_id,
            supplier: self.supplier,
            scheduled_date: self.scheduled_date,
            notes: self.notes,
            items: items
                .into_iter()
                .map(|i| ReceiptItem {
                    id: i.id,
                    product_id: i.product_id,
                    location_id: i.location_id,
                    quantity: i.quantity,
                })
                .collect(),
            created_by: self.created_by,
            validated_by: self.validated_by,
            validated_at: self.validated_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptLineInput {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReceiptInput {
    pub warehouse_id: Uuid,
    #[validate(length(max = 200, message = "Supplier must be at most 200 characters"))]
    pub supplier: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<ReceiptLineInput>,
}

/// Partial update; `items` replaces every line when present
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReceiptInput {
    pub warehouse_id: Option<Uuid>,
    #[validate(length(max = 200, message = "Supplier must be at most 200 characters"))]
    pub supplier: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: Option<DocumentStatus>,
    pub items: Option<Vec<ReceiptLineInput>>,
}

const RECEIPT_COLUMNS: &str = "id, number, status, warehouse_id, supplier, scheduled_date, notes, \
     created_by, validated_by, validated_at, created_at, updated_at";

async fn lock_receipt(conn: &mut PgConnection, receipt_id: Uuid) -> AppResult<ReceiptRow> {
    sqlx::query_as::<_, ReceiptRow>(&format!(
        "SELECT {RECEIPT_COLUMNS} FROM receipts WHERE id = $1 FOR UPDATE"
    ))
    .bind(receipt_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Receipt".to_string()))
}

async fn fetch_items(conn: &mut PgConnection, receipt_ids: &[Uuid]) -> AppResult<Vec<ReceiptItemRow>> {
    Ok(sqlx::query_as::<_, ReceiptItemRow>(
        r#"
        SELECT id, receipt_id, product_id, location_id, quantity
        FROM receipt_items
        WHERE receipt_id = ANY($1)
        ORDER BY receipt_id, line_no
        "#,
    )
    .bind(receipt_ids)
    .fetch_all(&mut *conn)
    .await?)
}

/// Check lines against the warehouse and catalog, then replace the stored lines
async fn write_lines(
    conn: &mut PgConnection,
    receipt_id: Uuid,
    warehouse_id: Uuid,
    lines: &[ReceiptLineInput],
) -> AppResult<()> {
    check_quantities(lines.iter().map(|l| l.quantity))?;
    stock::verify_locations(conn, warehouse_id, lines.iter().map(|l| l.location_id)).await?;
    stock::ensure_products_active(conn, lines.iter().map(|l| l.product_id)).await?;

    sqlx::query("DELETE FROM receipt_items WHERE receipt_id = $1")
        .bind(receipt_id)
        .execute(&mut *conn)
        .await?;

    for (line_no, line) in lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO receipt_items (receipt_id, line_no, product_id, location_id, quantity)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(receipt_id)
        .bind(line_no as i32)
        .bind(line.product_id)
        .bind(line.location_id)
        .bind(line.quantity)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

impl ReceiptService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, user: &AuthUser, input: CreateReceiptInput) -> AppResult<Receipt> {
        input.validate()?;
        user.ensure_warehouse(input.warehouse_id)?;

        let mut tx = self.db.begin().await?;
        stock::ensure_warehouse_active(&mut tx, input.warehouse_id).await?;

        let number = stock::next_document_number(&mut tx, KIND).await?;
        let receipt_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO receipts (number, warehouse_id, supplier, scheduled_date, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&number)
        .bind(input.warehouse_id)
        .bind(clean_text(input.supplier))
        .bind(input.scheduled_date)
        .bind(clean_text(input.notes))
        .bind(user.user_id)
        .fetch_one(&mut *tx)
        .await?;

        write_lines(&mut tx, receipt_id, input.warehouse_id, &input.items).await?;

        tx.commit().await?;

        tracing::info!(receipt = %number, lines = input.items.len(), "Receipt created");
        self.get(user, receipt_id).await
    }

    pub async fn list(&self, user: &AuthUser, filter: DocumentFilter) -> AppResult<Vec<Receipt>> {
        let warehouse_id = filter.warehouse_for(user)?;

        let rows = sqlx::query_as::<_, ReceiptRow>(&format!(
            r#"
            SELECT {RECEIPT_COLUMNS} FROM receipts
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR warehouse_id = $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(filter.status_str())
        .bind(warehouse_id)
        .fetch_all(&self.db)
        .await?;

        let mut conn = self.db.acquire().await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items: HashMap<Uuid, Vec<ReceiptItemRow>> = HashMap::new();
        for item in fetch_items(&mut conn, &ids).await? {
            items.entry(item.receipt_id).or_default().push(item);
        }

        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_receipt(lines)
            })
            .collect()
    }

    pub async fn get(&self, user: &AuthUser, receipt_id: Uuid) -> AppResult<Receipt> {
        let row = sqlx::query_as::<_, ReceiptRow>(&format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipts WHERE id = $1"
        ))
        .bind(receipt_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Receipt".to_string()))?;

        user.ensure_warehouse(row.warehouse_id)?;

        let mut conn = self.db.acquire().await?;
        let items = fetch_items(&mut conn, &[receipt_id]).await?;
        row.into_receipt(items)
    }

    pub async fn update(
        &self,
        user: &AuthUser,
        receipt_id: Uuid,
        input: UpdateReceiptInput,
    ) -> AppResult<Receipt> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let current = lock_receipt(&mut tx, receipt_id).await?;
        user.ensure_warehouse(current.warehouse_id)?;

        let status = current.status()?;
        KIND.ensure_editable(status)?;
        let next_status = requested_status(KIND, status, input.status)?;

        let warehouse_id = input.warehouse_id.unwrap_or(current.warehouse_id);
        if warehouse_id != current.warehouse_id {
            user.ensure_warehouse(warehouse_id)?;
            stock::ensure_warehouse_active(&mut tx, warehouse_id).await?;
        }

        match &input.items {
            Some(lines) => write_lines(&mut tx, receipt_id, warehouse_id, lines).await?,
            None if warehouse_id != current.warehouse_id => {
                // existing lines must still belong to the new warehouse
                let items = fetch_items(&mut tx, &[receipt_id]).await?;
                stock::verify_locations(&mut tx, warehouse_id, items.iter().map(|i| i.location_id))
                    .await?;
            }
            None => {}
        }

        sqlx::query(
            r#"
            UPDATE receipts SET
                warehouse_id = $2,
                supplier = COALESCE($3, supplier),
                scheduled_date = COALESCE($4, scheduled_date),
                notes = COALESCE($5, notes),
                status = $6,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(receipt_id)
        .bind(warehouse_id)
        .bind(clean_text(input.supplier))
        .bind(input.scheduled_date)
        .bind(clean_text(input.notes))
        .bind(next_status.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(receipt = %current.number, status = %next_status, "Receipt updated");
        self.get(user, receipt_id).await
    }

    /// Post every line into stock and mark the receipt done
    pub async fn validate(&self, user: &AuthUser, receipt_id: Uuid) -> AppResult<Receipt> {
        let mut tx = self.db.begin().await?;

        let header = lock_receipt(&mut tx, receipt_id).await?;
        user.ensure_warehouse(header.warehouse_id)?;
        KIND.transition(header.status()?, DocumentStatus::Done)?;

        stock::ensure_warehouse_active(&mut tx, header.warehouse_id).await?;
        let items = fetch_items(&mut tx, &[receipt_id]).await?;
        stock::verify_locations(&mut tx, header.warehouse_id, items.iter().map(|i| i.location_id))
            .await?;

        let lines: Vec<StockLine> = items
            .iter()
            .map(|i| StockLine {
                product_id: i.product_id,
                location_id: i.location_id,
                quantity: i.quantity,
            })
            .collect();

        let mut book = stock::lock_products(&mut tx, lines.iter().map(|l| l.product_id)).await?;
        let postings = plan_receipt(header.warehouse_id, &lines, &mut book)?;

        let document = DocumentRef {
            kind: KIND,
            id: header.id,
            number: header.number.clone(),
        };
        stock::record_postings(&mut tx, &book, &document, user.user_id, &postings).await?;

        sqlx::query(
            r#"
            UPDATE receipts
            SET status = 'done', validated_by = $2, validated_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(receipt_id)
        .bind(user.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            receipt = %header.number,
            lines = lines.len(),
            postings = postings.len(),
            "Receipt validated"
        );
        self.get(user, receipt_id).await
    }

    /// Cancel without touching stock
    pub async fn cancel(&self, user: &AuthUser, receipt_id: Uuid) -> AppResult<Receipt> {
        let mut tx = self.db.begin().await?;

        let header = lock_receipt(&mut tx, receipt_id).await?;
        user.ensure_warehouse(header.warehouse_id)?;
        KIND.transition(header.status()?, DocumentStatus::Canceled)?;

        sqlx::query("UPDATE receipts SET status = 'canceled', updated_at = NOW() WHERE id = $1")
            .bind(receipt_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(receipt = %header.number, "Receipt canceled");
        self.get(user, receipt_id).await
    }
}
