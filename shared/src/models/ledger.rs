//! Stock ledger models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of stock movement recorded in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Receipt,
    Delivery,
    Transfer,
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Receipt => "receipt",
            MovementType::Delivery => "delivery",
            MovementType::Transfer => "transfer",
            MovementType::Adjustment => "adjustment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "receipt" => Some(MovementType::Receipt),
            "delivery" => Some(MovementType::Delivery),
            "transfer" => Some(MovementType::Transfer),
            "adjustment" => Some(MovementType::Adjustment),
            _ => None,
        }
    }
}

/// Source and destination of a transfer, carried by both of its ledger rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRoute {
    pub source_warehouse_id: Uuid,
    pub source_location_id: Uuid,
    pub destination_warehouse_id: Uuid,
    pub destination_location_id: Uuid,
}

/// One immutable ledger row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub movement_type: MovementType,
    pub document_id: Uuid,
    pub document_number: String,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub location_id: Uuid,
    /// Signed change: negative for decreases
    pub quantity: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<TransferRoute>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// `quantity_after == quantity_before + quantity`
    pub fn reconciles(&self) -> bool {
        self.quantity_before.checked_add(self.quantity) == Some(self.quantity_after)
    }
}
