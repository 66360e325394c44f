//! Product catalog models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stock::StockMap;

/// A stocked product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    /// Unique, uppercased stock keeping unit
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub unit_of_measure: String,
    /// Quantity per location id; `total_stock` is derived from it
    pub stock_by_location: StockMap,
    pub total_stock: i64,
    pub reorder_level: i64,
    pub reorder_quantity: i64,
    /// Informational ceiling, not enforced
    pub max_stock: Option<i64>,
    pub unit_cost: Option<Decimal>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// At or below the reorder level
    pub fn needs_reorder(&self) -> bool {
        self.reorder_level > 0 && self.total_stock <= self.reorder_level
    }

    /// Value of the stock on hand, when a unit cost is known
    pub fn stock_value(&self) -> Option<Decimal> {
        self.unit_cost.map(|cost| cost * Decimal::from(self.total_stock))
    }
}

/// Catalog status; archived products are kept for the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    Archived,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ProductStatus::Active),
            "archived" => Some(ProductStatus::Archived),
            _ => None,
        }
    }
}

/// Stock of one product at one location, with location labels resolved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationStock {
    pub warehouse_id: Uuid,
    pub warehouse_code: String,
    pub location_id: Uuid,
    pub location_code: String,
    pub quantity: i64,
}
