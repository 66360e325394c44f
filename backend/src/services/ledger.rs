//! Stock ledger: append-only writer and filtered reads

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use shared::posting::Posting;
use shared::{
    DateRange, DocumentKind, LedgerEntry, MovementType, PaginatedResponse, Pagination,
    TransferRoute,
};

/// The document a batch of postings belongs to
#[derive(Debug, Clone)]
pub struct DocumentRef {
    pub kind: DocumentKind,
    pub id: Uuid,
    pub number: String,
}

/// Insert one ledger row per posting, in planner order.
///
/// Before and after values are taken from the postings as planned.
pub async fn append(
    conn: &mut PgConnection,
    document: &DocumentRef,
    created_by: Uuid,
    postings: &[Posting],
) -> AppResult<()> {
    for (sequence, posting) in postings.iter().enumerate() {
        if posting.movement_type != document.kind.movement_type() {
            return Err(AppError::Internal(format!(
                "{} posting filed under {}",
                posting.movement_type.as_str(),
                document.number
            )));
        }

        let route = posting.route;
        sqlx::query(
            r#"
            INSERT INTO stock_ledger (
                movement_type, document_id, document_number, product_id, warehouse_id,
                location_id, quantity, quantity_before, quantity_after,
                source_warehouse_id, source_location_id,
                destination_warehouse_id, destination_location_id,
                created_by, sequence
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(posting.movement_type.as_str())
        .bind(document.id)
        .bind(&document.number)
        .bind(posting.product_id)
        .bind(posting.warehouse_id)
        .bind(posting.location_id)
        .bind(posting.quantity)
        .bind(posting.quantity_before)
        .bind(posting.quantity_after)
        .bind(route.map(|r| r.source_warehouse_id))
        .bind(route.map(|r| r.source_location_id))
        .bind(route.map(|r| r.destination_warehouse_id))
        .bind(route.map(|r| r.destination_location_id))
        .bind(created_by)
        .bind(sequence as i32)
        .execute(&mut *conn)
        .await?;
    }

    tracing::debug!(
        document = %document.number,
        rows = postings.len(),
        "Ledger rows appended"
    );
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    id: Uuid,
    movement_type: String,
    document_id: Uuid,
    document_number: String,
    product_id: Uuid,
    warehouse_id: Uuid,
    location_id: Uuid,
    quantity: i64,
    quantity_before: i64,
    quantity_after: i64,
    source_warehouse_id: Option<Uuid>,
    source_location_id: Option<Uuid>,
    destination_warehouse_id: Option<Uuid>,
    destination_location_id: Option<Uuid>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl LedgerRow {
    fn into_entry(self) -> AppResult<LedgerEntry> {
        let movement_type = MovementType::from_str(&self.movement_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown movement type '{}'", self.movement_type))
        })?;

        let route = match (
            self.source_warehouse_id,
            self.source_location_id,
            self.destination_warehouse_id,
            self.destination_location_id,
        ) {
            (Some(sw), Some(sl), Some(dw), Some(dl)) => Some(TransferRoute {
                source_warehouse_id: sw,
                source_location_id: sl,
                destination_warehouse_id: dw,
                destination_location_id: dl,
            }),
            _ => None,
        };

        Ok(LedgerEntry {
            id: self.id,
            movement_type,
            document_id: self.document_id,
            document_number: self.document_number,
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
            location_id: self.location_id,
            quantity: self.quantity,
            quantity_before: self.quantity_before,
            quantity_after: self.quantity_after,
            route,
            created_by: self.created_by,
            created_at: self.created_at,
        })
    }
}

/// Query filters for ledger listings; dates are inclusive
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerFilter {
    pub movement_type: Option<MovementType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub product_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &LedgerFilter) {
    if let Some(movement_type) = filter.movement_type {
        builder
            .push(" AND movement_type = ")
            .push_bind(movement_type.as_str());
    }
    if let Some(from) = filter.from {
        builder.push(" AND created_at::date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        builder.push(" AND created_at::date <= ").push_bind(to);
    }
    if let Some(product_id) = filter.product_id {
        builder.push(" AND product_id = ").push_bind(product_id);
    }
    if let Some(warehouse_id) = filter.warehouse_id {
        builder.push(" AND warehouse_id = ").push_bind(warehouse_id);
    }
    if let Some(location_id) = filter.location_id {
        builder.push(" AND location_id = ").push_bind(location_id);
    }
}

#[derive(Clone)]
pub struct LedgerService {
    db: PgPool,
    default_page_size: u32,
    max_page_size: u32,
}

impl LedgerService {
    pub fn new(db: PgPool, config: &LedgerConfig) -> Self {
        Self {
            db,
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }

    /// Newest first, paginated
    pub async fn list(
        &self,
        user: &AuthUser,
        mut filter: LedgerFilter,
    ) -> AppResult<PaginatedResponse<LedgerEntry>> {
        let range = DateRange {
            start: filter.from,
            end: filter.to,
        };
        if !range.is_valid() {
            return Err(AppError::validation("from", "'from' must not be after 'to'"));
        }

        if let Some(scoped) = user.scoped_warehouse() {
            match filter.warehouse_id {
                Some(requested) => user.ensure_warehouse(requested)?,
                None => filter.warehouse_id = Some(scoped),
            }
        }

        let pagination = Pagination::from_query(
            filter.page,
            filter.per_page,
            self.default_page_size,
            self.max_page_size,
        );

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM stock_ledger WHERE TRUE");
        push_filters(&mut count, &filter);
        let total_items = count.build_query_scalar::<i64>().fetch_one(&self.db).await?;

        let mut query = QueryBuilder::<Postgres>::new(
            r#"
            SELECT id, movement_type, document_id, document_number, product_id, warehouse_id,
                   location_id, quantity, quantity_before, quantity_after,
                   source_warehouse_id, source_location_id,
                   destination_warehouse_id, destination_location_id,
                   created_by, created_at
            FROM stock_ledger
            WHERE TRUE
            "#,
        );
        push_filters(&mut query, &filter);
        query
            .push(" ORDER BY created_at DESC, sequence DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let entries = query
            .build_query_as::<LedgerRow>()
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(LedgerRow::into_entry)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse::new(
            entries,
            pagination,
            u64::try_from(total_items).unwrap_or(0),
        ))
    }

    pub async fn by_product(
        &self,
        user: &AuthUser,
        product_id: Uuid,
        filter: LedgerFilter,
    ) -> AppResult<PaginatedResponse<LedgerEntry>> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(product_id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Err(AppError::NotFound("Product".to_string()));
        }

        self.list(
            user,
            LedgerFilter {
                product_id: Some(product_id),
                ..filter
            },
        )
        .await
    }

    pub async fn by_warehouse(
        &self,
        user: &AuthUser,
        warehouse_id: Uuid,
        filter: LedgerFilter,
    ) -> AppResult<PaginatedResponse<LedgerEntry>> {
        user.ensure_warehouse(warehouse_id)?;

        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = $1)")
                .bind(warehouse_id)
                .fetch_one(&self.db)
                .await?;
        if !exists {
            return Err(AppError::NotFound("Warehouse".to_string()));
        }

        self.list(
            user,
            LedgerFilter {
                warehouse_id: Some(warehouse_id),
                ..filter
            },
        )
        .await
    }
}
