//! Transfer service: stock moved between locations

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::document::{clean_text, parse_status, requested_status, DocumentFilter};
use crate::services::ledger::DocumentRef;
use crate::services::stock;
use shared::posting::{check_quantities, plan_transfer, PostingError, TransferLine};
use shared::{DocumentKind, DocumentStatus, Transfer, TransferItem, TransferRoute};

const KIND: DocumentKind = DocumentKind::Transfer;

#[derive(Clone)]
pub struct TransferService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct TransferRow {
    id: Uuid,
    number: String,
    status: String,
    source_warehouse_id: Uuid,
    source_location_id: Uuid,
    destination_warehouse_id: Uuid,
    destination_location_id: Uuid,
    notes: Option<String>,
    created_by: Uuid,
    executed_by: Option<Uuid>,
    executed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct TransferItemRow {
    id: Uuid,
    transfer_id: Uuid,
    product_id: Uuid,
    quantity: i64,
}

impl TransferRow {
    fn status(&self) -> AppResult<DocumentStatus> {
        parse_status(KIND, &self.status)
    }

    fn route(&self) -> TransferRoute {
        TransferRoute {
            source_warehouse_id: self.source_warehouse_id,
            source_location_id: self.source_location_id,
            destination_warehouse_id: self.destination_warehouse_id,
            destination_location_id: self.destination_location_id,
        }
    }

    fn into_transfer(self, items: Vec<TransferItemRow>) -> AppResult<Transfer> {
        Ok(Transfer {
            status: self.status()?,
            id: self.id,
            number: self.number,
            source_warehouse_id: self.source_warehouse_id,
            source_location_id: self.source_location_id,
            destination_warehouse_id: self.destination_warehouse_id,
            destination_location_id: self.destination_location_id,
            notes: self.notes,
            items: items
                .into_iter()
                .map(|i| TransferItem {
                    id: i.id,
                    product_id: i.product_id,
                    quantity: i.quantity,
                })
                .collect(),
            created_by: self.created_by,
            executed_by: self.executed_by,
            executed_at: self.executed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferLineInput {
    pub product_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransferInput {
    pub source_warehouse_id: Uuid,
    pub source_location_id: Uuid,
    pub destination_warehouse_id: Uuid,
    pub destination_location_id: Uuid,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
    pub items: Vec<TransferLineInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTransferInput {
    pub source_warehouse_id: Option<Uuid>,
    pub source_location_id: Option<Uuid>,
    pub destination_warehouse_id: Option<Uuid>,
    pub destination_location_id: Option<Uuid>,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
    pub status: Option<DocumentStatus>,
    pub items: Option<Vec<TransferLineInput>>,
}

const TRANSFER_COLUMNS: &str = "id, number, status, source_warehouse_id, source_location_id, \
     destination_warehouse_id, destination_location_id, notes, created_by, executed_by, \
     executed_at, created_at, updated_at";

async fn lock_transfer(conn: &mut PgConnection, transfer_id: Uuid) -> AppResult<TransferRow> {
    sqlx::query_as::<_, TransferRow>(&format!(
        "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = $1 FOR UPDATE"
    ))
    .bind(transfer_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Transfer".to_string()))
}

async fn fetch_items(
    conn: &mut PgConnection,
    transfer_ids: &[Uuid],
) -> AppResult<Vec<TransferItemRow>> {
    Ok(sqlx::query_as::<_, TransferItemRow>(
        r#"
        SELECT id, transfer_id, product_id, quantity
        FROM transfer_items
        WHERE transfer_id = ANY($1)
        ORDER BY transfer_id, line_no
        "#,
    )
    .bind(transfer_ids)
    .fetch_all(&mut *conn)
    .await?)
}

/// Both ends exist, are active, and differ; the caller may act on both
async fn check_route(conn: &mut PgConnection, user: &AuthUser, route: &TransferRoute) -> AppResult<()> {
    if route.source_location_id == route.destination_location_id {
        return Err(PostingError::SameLocation.into());
    }
    user.ensure_warehouses(&[route.source_warehouse_id, route.destination_warehouse_id])?;

    stock::ensure_warehouse_active(conn, route.source_warehouse_id).await?;
    stock::verify_locations(conn, route.source_warehouse_id, [route.source_location_id]).await?;
    if route.destination_warehouse_id != route.source_warehouse_id {
        stock::ensure_warehouse_active(conn, route.destination_warehouse_id).await?;
    }
    stock::verify_locations(
        conn,
        route.destination_warehouse_id,
        [route.destination_location_id],
    )
    .await
}

async fn write_lines(
    conn: &mut PgConnection,
    transfer_id: Uuid,
    lines: &[TransferLineInput],
) -> AppResult<()> {
    check_quantities(lines.iter().map(|l| l.quantity))?;
    stock::ensure_products_active(conn, lines.iter().map(|l| l.product_id)).await?;

    sqlx::query("DELETE FROM transfer_items WHERE transfer_id = $1")
        .bind(transfer_id)
        .execute(&mut *conn)
        .await?;

    for (line_no, line) in lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO transfer_items (transfer_id, line_no, product_id, quantity)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(transfer_id)
        .bind(line_no as i32)
        .bind(line.product_id)
        .bind(line.quantity)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Readable when either end is within the caller's scope
fn ensure_visible(user: &AuthUser, row: &TransferRow) -> AppResult<()> {
    user.ensure_warehouse(row.source_warehouse_id)
        .or_else(|_| user.ensure_warehouse(row.destination_warehouse_id))
}

impl TransferService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, user: &AuthUser, input: CreateTransferInput) -> AppResult<Transfer> {
        input.validate()?;
        let route = TransferRoute {
            source_warehouse_id: input.source_warehouse_id,
            source_location_id: input.source_location_id,
            destination_warehouse_id: input.destination_warehouse_id,
            destination_location_id: input.destination_location_id,
        };

        let mut tx = self.db.begin().await?;
        check_route(&mut tx, user, &route).await?;

        let number = stock::next_document_number(&mut tx, KIND).await?;
        let transfer_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO transfers (
                number, source_warehouse_id, source_location_id,
                destination_warehouse_id, destination_location_id, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&number)
        .bind(route.source_warehouse_id)
        .bind(route.source_location_id)
        .bind(route.destination_warehouse_id)
        .bind(route.destination_location_id)
        .bind(clean_text(input.notes))
        .bind(user.user_id)
        .fetch_one(&mut *tx)
        .await?;

        write_lines(&mut tx, transfer_id, &input.items).await?;

        tx.commit().await?;

        tracing::info!(transfer = %number, lines = input.items.len(), "Transfer created");
        self.get(user, transfer_id).await
    }

    /// `warehouse_id` matches either end of the transfer
    pub async fn list(&self, user: &AuthUser, filter: DocumentFilter) -> AppResult<Vec<Transfer>> {
        let warehouse_id = filter.warehouse_for(user)?;

        let rows = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            SELECT {TRANSFER_COLUMNS} FROM transfers
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR source_warehouse_id = $2 OR destination_warehouse_id = $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(filter.status_str())
        .bind(warehouse_id)
        .fetch_all(&self.db)
        .await?;

        let mut conn = self.db.acquire().await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items: HashMap<Uuid, Vec<TransferItemRow>> = HashMap::new();
        for item in fetch_items(&mut conn, &ids).await? {
            items.entry(item.transfer_id).or_default().push(item);
        }

        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_transfer(lines)
            })
            .collect()
    }

    pub async fn get(&self, user: &AuthUser, transfer_id: Uuid) -> AppResult<Transfer> {
        let row = sqlx::query_as::<_, TransferRow>(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = $1"
        ))
        .bind(transfer_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;

        ensure_visible(user, &row)?;

        let mut conn = self.db.acquire().await?;
        let items = fetch_items(&mut conn, &[transfer_id]).await?;
        row.into_transfer(items)
    }

    pub async fn update(
        &self,
        user: &AuthUser,
        transfer_id: Uuid,
        input: UpdateTransferInput,
    ) -> AppResult<Transfer> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let current = lock_transfer(&mut tx, transfer_id).await?;
        let current_route = current.route();
        user.ensure_warehouses(&[
            current_route.source_warehouse_id,
            current_route.destination_warehouse_id,
        ])?;

        let status = current.status()?;
        KIND.ensure_editable(status)?;
        let next_status = requested_status(KIND, status, input.status)?;

        let route = TransferRoute {
            source_warehouse_id: input
                .source_warehouse_id
                .unwrap_or(current_route.source_warehouse_id),
            source_location_id: input
                .source_location_id
                .unwrap_or(current_route.source_location_id),
            destination_warehouse_id: input
                .destination_warehouse_id
                .unwrap_or(current_route.destination_warehouse_id),
            destination_location_id: input
                .destination_location_id
                .unwrap_or(current_route.destination_location_id),
        };
        if route != current_route {
            check_route(&mut tx, user, &route).await?;
        }

        if let Some(lines) = &input.items {
            write_lines(&mut tx, transfer_id, lines).await?;
        }

        sqlx::query(
            r#"
            UPDATE transfers SET
                source_warehouse_id = $2,
                source_location_id = $3,
                destination_warehouse_id = $4,
                destination_location_id = $5,
                notes = COALESCE($6, notes),
                status = $7,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(transfer_id)
        .bind(route.source_warehouse_id)
        .bind(route.source_location_id)
        .bind(route.destination_warehouse_id)
        .bind(route.destination_location_id)
        .bind(clean_text(input.notes))
        .bind(next_status.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(transfer = %current.number, status = %next_status, "Transfer updated");
        self.get(user, transfer_id).await
    }

    /// Move every line from source to destination and mark the transfer done
    pub async fn execute(&self, user: &AuthUser, transfer_id: Uuid) -> AppResult<Transfer> {
        let mut tx = self.db.begin().await?;

        let header = lock_transfer(&mut tx, transfer_id).await?;
        let route = header.route();
        user.ensure_warehouses(&[route.source_warehouse_id, route.destination_warehouse_id])?;
        KIND.transition(header.status()?, DocumentStatus::Done)?;

        check_route(&mut tx, user, &route).await?;

        let lines: Vec<TransferLine> = fetch_items(&mut tx, &[transfer_id])
            .await?
            .into_iter()
            .map(|i| TransferLine {
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect();

        let mut book = stock::lock_products(&mut tx, lines.iter().map(|l| l.product_id)).await?;
        let postings = match plan_transfer(route, &lines, &mut book) {
            Ok(postings) => postings,
            Err(err) => {
                tracing::warn!(transfer = %header.number, error = %err, "Transfer rejected");
                return Err(err.into());
            }
        };

        let document = DocumentRef {
            kind: KIND,
            id: header.id,
            number: header.number.clone(),
        };
        stock::record_postings(&mut tx, &book, &document, user.user_id, &postings).await?;

        sqlx::query(
            r#"
            UPDATE transfers
            SET status = 'done', executed_by = $2, executed_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(transfer_id)
        .bind(user.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            transfer = %header.number,
            lines = lines.len(),
            postings = postings.len(),
            "Transfer executed"
        );
        self.get(user, transfer_id).await
    }

    pub async fn cancel(&self, user: &AuthUser, transfer_id: Uuid) -> AppResult<Transfer> {
        let mut tx = self.db.begin().await?;

        let header = lock_transfer(&mut tx, transfer_id).await?;
        let route = header.route();
        user.ensure_warehouses(&[route.source_warehouse_id, route.destination_warehouse_id])?;
        KIND.transition(header.status()?, DocumentStatus::Canceled)?;

        sqlx::query("UPDATE transfers SET status = 'canceled', updated_at = NOW() WHERE id = $1")
            .bind(transfer_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(transfer = %header.number, "Transfer canceled");
        self.get(user, transfer_id).await
    }
}
