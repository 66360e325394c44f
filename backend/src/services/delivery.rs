//! Delivery service: outgoing goods with pick and pack tracking

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::document::{clean_text, parse_status, DocumentFilter};
use crate::services::ledger::DocumentRef;
use crate::services::stock;
use shared::fulfillment::{record_packs, record_picks, FulfillmentLine, LineQuantity};
use shared::posting::{check_quantities, plan_delivery, StockLine};
use shared::{Delivery, DeliveryItem, DocumentKind, DocumentStatus};

const KIND: DocumentKind = DocumentKind::Delivery;

#[derive(Clone)]
pub struct DeliveryService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    id: Uuid,
    number: String,
    status: String,
    warehouse_id: Uuid,
    customer: Option<String>,
    scheduled_date: Option<NaiveDate>,
    notes: Option<String>,
    created_by: Uuid,
    validated_by: Option<Uuid>,
    validated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct DeliveryItemRow {
    id: Uuid,
    delivery_id: Uuid,
    product_id: Uuid,
    location_id: Uuid,
    quantity: i64,
    picked_quantity: i64,
    packed_quantity: i64,
}

impl DeliveryItemRow {
    fn fulfillment(&self) -> FulfillmentLine {
        FulfillmentLine {
            item_id: self.id,
            quantity: self.quantity,
            picked_quantity: self.picked_quantity,
            packed_quantity: self.packed_quantity,
        }
    }
}

impl DeliveryRow {
    fn status(&self) -> AppResult<DocumentStatus> {
        parse_status(KIND, &self.status)
    }

    fn into_delivery(self, items: Vec<DeliveryItemRow>) -> AppResult<Delivery> {
        Ok(Delivery {
            status: self.status()?,
            id: self.id,
            number: self.number,
            warehouse_id: self.warehouse_id,
            customer: self.customer,
            scheduled_date: self.scheduled_date,
            notes: self.notes,
            items: items
                .into_iter()
                .map(|i| DeliveryItem {
                    id: i.id,
                    product_id: i.product_id,
                    location_id: i.location_id,
                    quantity: i.quantity,
                    picked_quantity: i.picked_quantity,
                    packed_quantity: i.packed_quantity,
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
pub struct DeliveryLineInput {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDeliveryInput {
    pub warehouse_id: Uuid,
    #[validate(length(max = 200, message = "Customer must be at most 200 characters"))]
    pub customer: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<DeliveryLineInput>,
}

/// Partial update; lines can only be replaced while draft or waiting
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDeliveryInput {
    pub warehouse_id: Option<Uuid>,
    #[validate(length(max = 200, message = "Customer must be at most 200 characters"))]
    pub customer: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Option<Vec<DeliveryLineInput>>,
}

/// One line of a pick request; no quantity means the full line
#[derive(Debug, Clone, Deserialize)]
pub struct PickInput {
    #[serde(alias = "itemId")]
    pub item_id: Uuid,
    #[serde(alias = "pickedQuantity")]
    pub picked_quantity: Option<i64>,
}

/// One line of a pack request; no quantity means whatever was picked
#[derive(Debug, Clone, Deserialize)]
pub struct PackInput {
    #[serde(alias = "itemId")]
    pub item_id: Uuid,
    #[serde(alias = "packedQuantity")]
    pub packed_quantity: Option<i64>,
}

const DELIVERY_COLUMNS: &str = "id, number, status, warehouse_id, customer, scheduled_date, notes, \
     created_by, validated_by, validated_at, created_at, updated_at";

async fn lock_delivery(conn: &mut PgConnection, delivery_id: Uuid) -> AppResult<DeliveryRow> {
    sqlx::query_as::<_, DeliveryRow>(&format!(
        "SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE id = $1 FOR UPDATE"
    ))
    .bind(delivery_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Delivery".to_string()))
}

async fn fetch_items(
    conn: &mut PgConnection,
    delivery_ids: &[Uuid],
) -> AppResult<Vec<DeliveryItemRow>> {
    Ok(sqlx::query_as::<_, DeliveryItemRow>(
        r#"
        SELECT id, delivery_id, product_id, location_id, quantity, picked_quantity, packed_quantity
        FROM delivery_items
        WHERE delivery_id = ANY($1)
        ORDER BY delivery_id, line_no
        "#,
    )
    .bind(delivery_ids)
    .fetch_all(&mut *conn)
    .await?)
}

async fn write_lines(
    conn: &mut PgConnection,
    delivery_id: Uuid,
    warehouse_id: Uuid,
    lines: &[DeliveryLineInput],
) -> AppResult<()> {
    check_quantities(lines.iter().map(|l| l.quantity))?;
    stock::verify_locations(conn, warehouse_id, lines.iter().map(|l| l.location_id)).await?;
    stock::ensure_products_active(conn, lines.iter().map(|l| l.product_id)).await?;

    sqlx::query("DELETE FROM delivery_items WHERE delivery_id = $1")
        .bind(delivery_id)
        .execute(&mut *conn)
        .await?;

    for (line_no, line) in lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO delivery_items (delivery_id, line_no, product_id, location_id, quantity)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(delivery_id)
        .bind(line_no as i32)
        .bind(line.product_id)
        .bind(line.location_id)
        .bind(line.quantity)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn set_status(conn: &mut PgConnection, delivery_id: Uuid, status: DocumentStatus) -> AppResult<()> {
    sqlx::query("UPDATE deliveries SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(delivery_id)
        .bind(status.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

impl DeliveryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, user: &AuthUser, input: CreateDeliveryInput) -> AppResult<Delivery> {
        input.validate()?;
        user.ensure_warehouse(input.warehouse_id)?;

        let mut tx = self.db.begin().await?;
        stock::ensure_warehouse_active(&mut tx, input.warehouse_id).await?;

        let number = stock::next_document_number(&mut tx, KIND).await?;
        let delivery_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO deliveries (number, warehouse_id, customer, scheduled_date, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&number)
        .bind(input.warehouse_id)
        .bind(clean_text(input.customer))
        .bind(input.scheduled_date)
        .bind(clean_text(input.notes))
        .bind(user.user_id)
        .fetch_one(&mut *tx)
        .await?;

        write_lines(&mut tx, delivery_id, input.warehouse_id, &input.items).await?;

        tx.commit().await?;

        tracing::info!(delivery = %number, lines = input.items.len(), "Delivery created");
        self.get(user, delivery_id).await
    }

    pub async fn list(&self, user: &AuthUser, filter: DocumentFilter) -> AppResult<Vec<Delivery>> {
        let warehouse_id = filter.warehouse_for(user)?;

        let rows = sqlx::query_as::<_, DeliveryRow>(&format!(
            r#"
            SELECT {DELIVERY_COLUMNS} FROM deliveries
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
        let mut items: HashMap<Uuid, Vec<DeliveryItemRow>> = HashMap::new();
        for item in fetch_items(&mut conn, &ids).await? {
            items.entry(item.delivery_id).or_default().push(item);
        }

        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_delivery(lines)
            })
            .collect()
    }

    pub async fn get(&self, user: &AuthUser, delivery_id: Uuid) -> AppResult<Delivery> {
        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE id = $1"
        ))
        .bind(delivery_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Delivery".to_string()))?;

        user.ensure_warehouse(row.warehouse_id)?;

        let mut conn = self.db.acquire().await?;
        let items = fetch_items(&mut conn, &[delivery_id]).await?;
        row.into_delivery(items)
    }

    pub async fn update(
        &self,
        user: &AuthUser,
        delivery_id: Uuid,
        input: UpdateDeliveryInput,
    ) -> AppResult<Delivery> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let current = lock_delivery(&mut tx, delivery_id).await?;
        user.ensure_warehouse(current.warehouse_id)?;

        let status = current.status()?;
        KIND.ensure_editable(status)?;

        let warehouse_id = input.warehouse_id.unwrap_or(current.warehouse_id);
        let moves_warehouse = warehouse_id != current.warehouse_id;
        let lines_locked = !matches!(status, DocumentStatus::Draft | DocumentStatus::Waiting);
        if lines_locked && (input.items.is_some() || moves_warehouse) {
            return Err(AppError::InvalidState(format!(
                "Delivery lines cannot change once it is {}",
                status
            )));
        }

        if moves_warehouse {
            user.ensure_warehouse(warehouse_id)?;
            stock::ensure_warehouse_active(&mut tx, warehouse_id).await?;
        }

        match &input.items {
            Some(lines) => write_lines(&mut tx, delivery_id, warehouse_id, lines).await?,
            None if moves_warehouse => {
                let items = fetch_items(&mut tx, &[delivery_id]).await?;
                stock::verify_locations(&mut tx, warehouse_id, items.iter().map(|i| i.location_id))
                    .await?;
            }
            None => {}
        }

        sqlx::query(
            r#"
            UPDATE deliveries SET
                warehouse_id = $2,
                customer = COALESCE($3, customer),
                scheduled_date = COALESCE($4, scheduled_date),
                notes = COALESCE($5, notes),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(delivery_id)
        .bind(warehouse_id)
        .bind(clean_text(input.customer))
        .bind(input.scheduled_date)
        .bind(clean_text(input.notes))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(delivery = %current.number, "Delivery updated");
        self.get(user, delivery_id).await
    }

    /// Draft -> waiting
    pub async fn confirm(&self, user: &AuthUser, delivery_id: Uuid) -> AppResult<Delivery> {
        let mut tx = self.db.begin().await?;

        let header = lock_delivery(&mut tx, delivery_id).await?;
        user.ensure_warehouse(header.warehouse_id)?;
        let status = header.status()?;
        if status != DocumentStatus::Draft {
            KIND.ensure_editable(status)?;
            return Err(AppError::InvalidState(
                "Only draft deliveries can be confirmed".to_string(),
            ));
        }
        let next = KIND.transition(status, DocumentStatus::Waiting)?;
        set_status(&mut tx, delivery_id, next).await?;

        tx.commit().await?;

        tracing::info!(delivery = %header.number, "Delivery confirmed");
        self.get(user, delivery_id).await
    }

    /// Record picked quantities; an empty request picks every line in full
    pub async fn pick(
        &self,
        user: &AuthUser,
        delivery_id: Uuid,
        picks: Vec<PickInput>,
    ) -> AppResult<Delivery> {
        let mut tx = self.db.begin().await?;

        let header = lock_delivery(&mut tx, delivery_id).await?;
        user.ensure_warehouse(header.warehouse_id)?;
        let next = KIND.transition(header.status()?, DocumentStatus::Picking)?;

        let items = fetch_items(&mut tx, &[delivery_id]).await?;
        let mut lines: Vec<FulfillmentLine> = items.iter().map(DeliveryItemRow::fulfillment).collect();
        let requests: Vec<LineQuantity> = picks
            .iter()
            .map(|p| LineQuantity {
                item_id: p.item_id,
                quantity: p.picked_quantity,
            })
            .collect();
        record_picks(&mut lines, &requests)?;

        for line in &lines {
            sqlx::query("UPDATE delivery_items SET picked_quantity = $2 WHERE id = $1")
                .bind(line.item_id)
                .bind(line.picked_quantity)
                .execute(&mut *tx)
                .await?;
        }
        set_status(&mut tx, delivery_id, next).await?;

        tx.commit().await?;

        tracing::info!(delivery = %header.number, lines = requests.len(), "Delivery picked");
        self.get(user, delivery_id).await
    }

    /// Record packed quantities, bounded by what was picked; the delivery becomes
    /// ready once every line is packed in full
    pub async fn pack(
        &self,
        user: &AuthUser,
        delivery_id: Uuid,
        packs: Vec<PackInput>,
    ) -> AppResult<Delivery> {
        let mut tx = self.db.begin().await?;

        let header = lock_delivery(&mut tx, delivery_id).await?;
        user.ensure_warehouse(header.warehouse_id)?;
        let status = header.status()?;
        if !matches!(status, DocumentStatus::Picking | DocumentStatus::Packing) {
            KIND.ensure_editable(status)?;
            return Err(AppError::InvalidState(format!(
                "Delivery must be picked before packing; it is {}",
                status
            )));
        }

        let items = fetch_items(&mut tx, &[delivery_id]).await?;
        let mut lines: Vec<FulfillmentLine> = items.iter().map(DeliveryItemRow::fulfillment).collect();
        let requests: Vec<LineQuantity> = packs
            .iter()
            .map(|p| LineQuantity {
                item_id: p.item_id,
                quantity: p.packed_quantity,
            })
            .collect();
        let target = record_packs(&mut lines, &requests)?;
        let next = KIND.transition(status, target)?;

        for line in &lines {
            sqlx::query("UPDATE delivery_items SET packed_quantity = $2 WHERE id = $1")
                .bind(line.item_id)
                .bind(line.packed_quantity)
                .execute(&mut *tx)
                .await?;
        }
        set_status(&mut tx, delivery_id, next).await?;

        tx.commit().await?;

        tracing::info!(delivery = %header.number, status = %next, "Delivery packed");
        self.get(user, delivery_id).await
    }

    /// Take every line out of stock, all or nothing, and mark the delivery done
    pub async fn validate(&self, user: &AuthUser, delivery_id: Uuid) -> AppResult<Delivery> {
        let mut tx = self.db.begin().await?;

        let header = lock_delivery(&mut tx, delivery_id).await?;
        user.ensure_warehouse(header.warehouse_id)?;
        KIND.transition(header.status()?, DocumentStatus::Done)?;

        stock::ensure_warehouse_active(&mut tx, header.warehouse_id).await?;
        let items = fetch_items(&mut tx, &[delivery_id]).await?;
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
        let postings = match plan_delivery(header.warehouse_id, &lines, &mut book) {
            Ok(postings) => postings,
            Err(err) => {
                tracing::warn!(delivery = %header.number, error = %err, "Delivery rejected");
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
            UPDATE deliveries
            SET status = 'done', validated_by = $2, validated_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(delivery_id)
        .bind(user.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            delivery = %header.number,
            lines = lines.len(),
            postings = postings.len(),
            "Delivery validated"
        );
        self.get(user, delivery_id).await
    }

    pub async fn cancel(&self, user: &AuthUser, delivery_id: Uuid) -> AppResult<Delivery> {
        let mut tx = self.db.begin().await?;

        let header = lock_delivery(&mut tx, delivery_id).await?;
        user.ensure_warehouse(header.warehouse_id)?;
        let next = KIND.transition(header.status()?, DocumentStatus::Canceled)?;
        set_status(&mut tx, delivery_id, next).await?;

        tx.commit().await?;

        tracing::info!(delivery = %header.number, "Delivery canceled");
        self.get(user, delivery_id).await
    }
}
