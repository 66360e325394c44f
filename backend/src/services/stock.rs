//! Locked stock access shared by the movement services
//!
//! Everything here runs on the caller's transaction. Product rows are locked
//! with `FOR UPDATE` in id order before their stock maps are loaded into a
//! [`StockBook`]; only the book's dirty products are written back.

use std::collections::{BTreeSet, HashSet};

use sqlx::{types::Json, PgConnection};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::ledger::{self, DocumentRef};
use shared::posting::Posting;
use shared::stock::{StockBook, StockMap};
use shared::{document_number, DocumentKind, ProductStatus};

#[derive(Debug, sqlx::FromRow)]
struct LockedProduct {
    id: Uuid,
    sku: String,
    status: String,
    stock_by_location: Json<StockMap>,
}

fn sorted_ids(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

fn first_missing(wanted: &[Uuid], found: &HashSet<Uuid>) -> Option<Uuid> {
    wanted.iter().copied().find(|id| !found.contains(id))
}

/// Lock every referenced product and load its stock into a fresh book
pub async fn lock_products(
    conn: &mut PgConnection,
    product_ids: impl IntoIterator<Item = Uuid>,
) -> AppResult<StockBook> {
    let ids = sorted_ids(product_ids);

    let rows = sqlx::query_as::<_, LockedProduct>(
        r#"
        SELECT id, sku, status, stock_by_location
        FROM products
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let found: HashSet<Uuid> = rows.iter().map(|r| r.id).collect();
    if let Some(missing) = first_missing(&ids, &found) {
        return Err(AppError::NotFound(format!("Product {}", missing)));
    }

    let mut book = StockBook::new();
    for row in rows {
        if row.status != ProductStatus::Active.as_str() {
            return Err(AppError::validation(
                "product_id",
                format!("Product {} is archived", row.sku),
            ));
        }
        book.insert(row.id, row.stock_by_location.0);
    }

    Ok(book)
}

/// Check that products exist and are not archived, without locking
pub async fn ensure_products_active(
    conn: &mut PgConnection,
    product_ids: impl IntoIterator<Item = Uuid>,
) -> AppResult<()> {
    let ids = sorted_ids(product_ids);

    let rows = sqlx::query_as::<_, (Uuid, String, String)>(
        "SELECT id, sku, status FROM products WHERE id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let found: HashSet<Uuid> = rows.iter().map(|(id, _, _)| *id).collect();
    if let Some(missing) = first_missing(&ids, &found) {
        return Err(AppError::NotFound(format!("Product {}", missing)));
    }

    if let Some((_, sku, _)) = rows
        .iter()
        .find(|(_, _, status)| status != ProductStatus::Active.as_str())
    {
        return Err(AppError::validation(
            "product_id",
            format!("Product {} is archived", sku),
        ));
    }

    Ok(())
}

/// Write each dirty stock map and its total in one statement per product
pub async fn persist_book(conn: &mut PgConnection, book: &StockBook) -> AppResult<()> {
    for (product_id, stock) in book.dirty() {
        sqlx::query(
            r#"
            UPDATE products
            SET stock_by_location = $2, total_stock = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .bind(Json(stock))
        .bind(stock.total())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Persist the book and append the planned postings to the ledger
pub async fn record_postings(
    conn: &mut PgConnection,
    book: &StockBook,
    document: &DocumentRef,
    created_by: Uuid,
    postings: &[Posting],
) -> AppResult<()> {
    persist_book(conn, book).await?;
    ledger::append(conn, document, created_by, postings).await
}

/// Warehouse must exist and be active
pub async fn ensure_warehouse_active(conn: &mut PgConnection, warehouse_id: Uuid) -> AppResult<()> {
    let active = sqlx::query_scalar::<_, bool>("SELECT is_active FROM warehouses WHERE id = $1")
        .bind(warehouse_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Warehouse {}", warehouse_id)))?;

    if !active {
        return Err(AppError::InvalidState(format!(
            "Warehouse {} is inactive",
            warehouse_id
        )));
    }
    Ok(())
}

/// Every location must be an active location of the given warehouse.
/// Share-locks them so none can be deactivated before the caller commits.
pub async fn verify_locations(
    conn: &mut PgConnection,
    warehouse_id: Uuid,
    location_ids: impl IntoIterator<Item = Uuid>,
) -> AppResult<()> {
    let ids = sorted_ids(location_ids);

    let found: HashSet<Uuid> = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id FROM locations
        WHERE warehouse_id = $1 AND id = ANY($2) AND is_active
        FOR SHARE
        "#,
    )
    .bind(warehouse_id)
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .collect();

    match first_missing(&ids, &found) {
        Some(missing) => Err(AppError::NotFound(format!(
            "Location {} in warehouse {}",
            missing, warehouse_id
        ))),
        None => Ok(()),
    }
}

/// Current quantity at (product, location), read without a lock
pub async fn current_quantity(
    conn: &mut PgConnection,
    product_id: Uuid,
    location_id: Uuid,
) -> AppResult<i64> {
    let Json(stock) = sqlx::query_scalar::<_, Json<StockMap>>(
        "SELECT stock_by_location FROM products WHERE id = $1",
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))?;

    Ok(stock.get(&location_id.to_string()))
}

/// Next number for a document kind, e.g. `DLV-00007`
pub async fn next_document_number(conn: &mut PgConnection, kind: DocumentKind) -> AppResult<String> {
    let sequence = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO document_sequences (prefix, value)
        VALUES ($1, 1)
        ON CONFLICT (prefix) DO UPDATE SET value = document_sequences.value + 1
        RETURNING value
        "#,
    )
    .bind(kind.prefix())
    .fetch_one(&mut *conn)
    .await?;

    Ok(document_number(kind, sequence))
}
