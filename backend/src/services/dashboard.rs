//! Dashboard summary figures

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::error::AppResult;
use crate::middleware::AuthUser;

#[derive(Clone)]
pub struct DashboardService {
    db: PgPool,
}

/// Documents still waiting to be validated or executed
#[derive(Debug, Default, Serialize)]
pub struct PendingDocuments {
    pub receipts: i64,
    pub deliveries: i64,
    pub transfers: i64,
    pub adjustments: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub total_products: i64,
    pub active_products: i64,
    pub total_units: i64,
    /// Sum of `total_stock * unit_cost` over products with a known cost
    pub stock_valuation: Decimal,
    pub low_stock_products: i64,
    pub active_alerts: i64,
    pub pending: PendingDocuments,
}

#[derive(sqlx::FromRow)]
struct CatalogFigures {
    total_products: i64,
    active_products: i64,
    total_units: i64,
    stock_valuation: Decimal,
    low_stock_products: i64,
}

impl DashboardService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Catalog figures are global; pending document counts follow the user's warehouse scope
    pub async fn summary(&self, user: &AuthUser) -> AppResult<DashboardSummary> {
        let catalog = sqlx::query_as::<_, CatalogFigures>(
            r#"
            SELECT
                COUNT(*) AS total_products,
                COUNT(*) FILTER (WHERE status = 'active') AS active_products,
                COALESCE(SUM(total_stock), 0)::BIGINT AS total_units,
                COALESCE(SUM(total_stock * unit_cost), 0)::NUMERIC AS stock_valuation,
                COUNT(*) FILTER (
                    WHERE status = 'active' AND reorder_level > 0 AND total_stock <= reorder_level
                ) AS low_stock_products
            FROM products
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        let active_alerts: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM alerts WHERE status = 'Active'")
                .fetch_one(&self.db)
                .await?;

        // Transfers count when either end is in scope
        let pending: (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM receipts
                  WHERE status NOT IN ('done', 'canceled')
                    AND ($1::uuid IS NULL OR warehouse_id = $1)),
                (SELECT COUNT(*) FROM deliveries
                  WHERE status NOT IN ('done', 'canceled')
                    AND ($1::uuid IS NULL OR warehouse_id = $1)),
                (SELECT COUNT(*) FROM transfers
                  WHERE status NOT IN ('done', 'canceled')
                    AND ($1::uuid IS NULL OR source_warehouse_id = $1 OR destination_warehouse_id = $1)),
                (SELECT COUNT(*) FROM adjustments
                  WHERE status NOT IN ('done', 'canceled')
                    AND ($1::uuid IS NULL OR warehouse_id = $1))
            "#,
        )
        .bind(user.scoped_warehouse())
        .fetch_one(&self.db)
        .await?;

        tracing::debug!(user_id = %user.user_id, "Dashboard summary computed");

        Ok(DashboardSummary {
            total_products: catalog.total_products,
            active_products: catalog.active_products,
            total_units: catalog.total_units,
            stock_valuation: catalog.stock_valuation,
            low_stock_products: catalog.low_stock_products,
            active_alerts,
            pending: PendingDocuments {
                receipts: pending.0,
                deliveries: pending.1,
                transfers: pending.2,
                adjustments: pending.3,
            },
        })
    }
}
