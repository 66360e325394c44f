//! Movement documents: receipts, deliveries, transfers and adjustments
//!
//! All four share one lifecycle type. Transitions are checked against an
//! allow-list per document kind; `done` and `canceled` have no outgoing
//! transitions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::MovementType;

/// Kind of movement document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Receipt,
    Delivery,
    Transfer,
    Adjustment,
}

impl DocumentKind {
    /// Prefix used in generated document numbers
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Receipt => "RCP",
            DocumentKind::Delivery => "DLV",
            DocumentKind::Transfer => "TRF",
            DocumentKind::Adjustment => "ADJ",
        }
    }

    pub fn movement_type(&self) -> MovementType {
        match self {
            DocumentKind::Receipt => MovementType::Receipt,
            DocumentKind::Delivery => MovementType::Delivery,
            DocumentKind::Transfer => MovementType::Transfer,
            DocumentKind::Adjustment => MovementType::Adjustment,
        }
    }

    /// Statuses a document of this kind can be in
    pub fn statuses(&self) -> &'static [DocumentStatus] {
        use DocumentStatus::*;
        match self {
            DocumentKind::Receipt => &[Draft, Waiting, Ready, Done, Canceled],
            DocumentKind::Delivery => &[Draft, Waiting, Picking, Packing, Ready, Done, Canceled],
            DocumentKind::Transfer => &[Draft, Waiting, Done, Canceled],
            DocumentKind::Adjustment => &[Draft, Done, Canceled],
        }
    }

    /// Forward moves between non-terminal statuses
    fn forward_moves(&self) -> &'static [(DocumentStatus, DocumentStatus)] {
        use DocumentStatus::*;
        match self {
            DocumentKind::Receipt => &[(Draft, Waiting), (Draft, Ready), (Waiting, Ready)],
            DocumentKind::Delivery => &[
                (Draft, Waiting),
                (Draft, Picking),
                (Waiting, Picking),
                (Picking, Picking),
                (Picking, Packing),
                (Picking, Ready),
                (Packing, Packing),
                (Packing, Ready),
            ],
            DocumentKind::Transfer => &[(Draft, Waiting)],
            DocumentKind::Adjustment => &[],
        }
    }

    /// Whether `from -> to` is an allowed transition for this kind
    pub fn allows(&self, from: DocumentStatus, to: DocumentStatus) -> bool {
        let statuses = self.statuses();
        if from.is_terminal() || !statuses.contains(&from) || !statuses.contains(&to) {
            return false;
        }
        to.is_terminal() || self.forward_moves().contains(&(from, to))
    }

    /// Check a transition and return the new status
    pub fn transition(
        &self,
        from: DocumentStatus,
        to: DocumentStatus,
    ) -> Result<DocumentStatus, StatusError> {
        match from {
            DocumentStatus::Done => Err(StatusError::AlreadyValidated(*self)),
            DocumentStatus::Canceled => Err(StatusError::Canceled(*self)),
            _ if self.allows(from, to) => Ok(to),
            _ => Err(StatusError::NotAllowed {
                kind: *self,
                from,
                to,
            }),
        }
    }

    /// Check that a document can still be edited
    pub fn ensure_editable(&self, status: DocumentStatus) -> Result<(), StatusError> {
        match status {
            DocumentStatus::Done => Err(StatusError::AlreadyValidated(*self)),
            DocumentStatus::Canceled => Err(StatusError::Canceled(*self)),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Receipt => write!(f, "Receipt"),
            DocumentKind::Delivery => write!(f, "Delivery"),
            DocumentKind::Transfer => write!(f, "Transfer"),
            DocumentKind::Adjustment => write!(f, "Adjustment"),
        }
    }
}

/// Lifecycle status of a movement document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Waiting,
    Picking,
    Packing,
    Ready,
    Done,
    Canceled,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Waiting => "waiting",
            DocumentStatus::Picking => "picking",
            DocumentStatus::Packing => "packing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Done => "done",
            DocumentStatus::Canceled => "canceled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(DocumentStatus::Draft),
            "waiting" => Some(DocumentStatus::Waiting),
            "picking" => Some(DocumentStatus::Picking),
            "packing" => Some(DocumentStatus::Packing),
            "ready" => Some(DocumentStatus::Ready),
            "done" => Some(DocumentStatus::Done),
            "canceled" => Some(DocumentStatus::Canceled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Done | DocumentStatus::Canceled)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected status transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("{0} already validated")]
    AlreadyValidated(DocumentKind),

    #[error("{0} is canceled")]
    Canceled(DocumentKind),

    #[error("{kind} cannot move from {from} to {to}")]
    NotAllowed {
        kind: DocumentKind,
        from: DocumentStatus,
        to: DocumentStatus,
    },
}

/// Generate a document number such as `RCP-00042`
pub fn document_number(kind: DocumentKind, sequence: i64) -> String {
    format!("{}-{:05}", kind.prefix(), sequence)
}

/// Goods received into a warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: Uuid,
    pub number: String,
    pub status: DocumentStatus,
    pub warehouse_id: Uuid,
    pub supplier: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<ReceiptItem>,
    pub created_by: Uuid,
    pub validated_by: Option<Uuid>,
    pub validated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub quantity: i64,
}

/// Goods shipped out of a warehouse, with pick/pack tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub number: String,
    pub status: DocumentStatus,
    pub warehouse_id: Uuid,
    pub customer: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<DeliveryItem>,
    pub created_by: Uuid,
    pub validated_by: Option<Uuid>,
    pub validated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub quantity: i64,
    pub picked_quantity: i64,
    pub packed_quantity: i64,
}

/// Stock moved from one location to another
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub number: String,
    pub status: DocumentStatus,
    pub source_warehouse_id: Uuid,
    pub source_location_id: Uuid,
    pub destination_warehouse_id: Uuid,
    pub destination_location_id: Uuid,
    pub notes: Option<String>,
    pub items: Vec<TransferItem>,
    pub created_by: Uuid,
    pub executed_by: Option<Uuid>,
    pub executed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
}

/// Physical count reconciling one (product, location)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adjustment {
    pub id: Uuid,
    pub number: String,
    pub status: DocumentStatus,
    pub warehouse_id: Uuid,
    pub location_id: Uuid,
    pub product_id: Uuid,
    pub counted_quantity: i64,
    /// Stock at the location when the count was recorded
    pub system_quantity: i64,
    pub difference: i64,
    pub reason: Option<String>,
    pub created_by: Uuid,
    pub validated_by: Option<Uuid>,
    pub validated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use DocumentStatus::*;

    #[test]
    fn test_document_number_padding() {
        assert_eq!(document_number(DocumentKind::Receipt, 1), "RCP-00001");
        assert_eq!(document_number(DocumentKind::Transfer, 42), "TRF-00042");
        assert_eq!(document_number(DocumentKind::Delivery, 123456), "DLV-123456");
    }

    #[test]
    fn test_done_has_no_outgoing_transitions() {
        for kind in [
            DocumentKind::Receipt,
            DocumentKind::Delivery,
            DocumentKind::Transfer,
            DocumentKind::Adjustment,
        ] {
            for to in kind.statuses() {
                assert!(!kind.allows(Done, *to));
                assert!(!kind.allows(Canceled, *to));
            }
            assert_eq!(
                kind.transition(Done, Done),
                Err(StatusError::AlreadyValidated(kind))
            );
            assert_eq!(kind.transition(Canceled, Done), Err(StatusError::Canceled(kind)));
        }
    }

    #[test]
    fn test_delivery_pick_pack_path() {
        let kind = DocumentKind::Delivery;
        assert_eq!(kind.transition(Draft, Waiting), Ok(Waiting));
        assert_eq!(kind.transition(Waiting, Picking), Ok(Picking));
        assert_eq!(kind.transition(Picking, Packing), Ok(Packing));
        assert_eq!(kind.transition(Packing, Ready), Ok(Ready));
        assert_eq!(kind.transition(Ready, Done), Ok(Done));
    }

    #[test]
    fn test_delivery_cannot_pack_from_draft() {
        let kind = DocumentKind::Delivery;
        assert!(matches!(
            kind.transition(Draft, Packing),
            Err(StatusError::NotAllowed { .. })
        ));
        assert!(!kind.allows(Ready, Picking));
    }

    #[test]
    fn test_adjustment_only_draft_to_terminal() {
        let kind = DocumentKind::Adjustment;
        assert!(kind.allows(Draft, Done));
        assert!(kind.allows(Draft, Canceled));
        assert!(!kind.allows(Draft, Waiting));
    }

    #[test]
    fn test_receipt_rejects_delivery_statuses() {
        assert!(!DocumentKind::Receipt.allows(Draft, Picking));
        assert!(!DocumentKind::Receipt.allows(Picking, Done));
    }

    #[test]
    fn test_status_roundtrip_strings() {
        for status in [Draft, Waiting, Picking, Packing, Ready, Done, Canceled] {
            assert_eq!(DocumentStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(DocumentStatus::from_str("validated"), None);
    }
}
