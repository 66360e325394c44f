//! Low stock alert models and classification

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Kind of stock alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertType {
    #[serde(rename = "Low Stock")]
    LowStock,
    #[serde(rename = "Out of Stock")]
    OutOfStock,
    #[serde(rename = "Critical Stock")]
    CriticalStock,
    #[serde(rename = "Reorder Suggestion")]
    ReorderSuggestion,
}

impl AlertType {
    /// Types covered by the one-active-alert-per-product rule
    pub const MONITORED: [AlertType; 4] = [
        AlertType::LowStock,
        AlertType::OutOfStock,
        AlertType::CriticalStock,
        AlertType::ReorderSuggestion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::LowStock => "Low Stock",
            AlertType::OutOfStock => "Out of Stock",
            AlertType::CriticalStock => "Critical Stock",
            AlertType::ReorderSuggestion => "Reorder Suggestion",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Low Stock" => Some(AlertType::LowStock),
            "Out of Stock" => Some(AlertType::OutOfStock),
            "Critical Stock" => Some(AlertType::CriticalStock),
            "Reorder Suggestion" => Some(AlertType::ReorderSuggestion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "Low",
            AlertSeverity::Medium => "Medium",
            AlertSeverity::High => "High",
            AlertSeverity::Critical => "Critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Low" => Some(AlertSeverity::Low),
            "Medium" => Some(AlertSeverity::Medium),
            "High" => Some(AlertSeverity::High),
            "Critical" => Some(AlertSeverity::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "Active",
            AlertStatus::Acknowledged => "Acknowledged",
            AlertStatus::Resolved => "Resolved",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(AlertStatus::Active),
            "Acknowledged" => Some(AlertStatus::Acknowledged),
            "Resolved" => Some(AlertStatus::Resolved),
            _ => None,
        }
    }

    /// Active -> Acknowledged
    pub fn acknowledge(self) -> Result<Self, AlertError> {
        match self {
            AlertStatus::Active => Ok(AlertStatus::Acknowledged),
            other => Err(AlertError::InvalidTransition {
                from: other,
                to: AlertStatus::Acknowledged,
            }),
        }
    }

    /// Active | Acknowledged -> Resolved
    pub fn resolve(self) -> Result<Self, AlertError> {
        match self {
            AlertStatus::Active | AlertStatus::Acknowledged => Ok(AlertStatus::Resolved),
            AlertStatus::Resolved => Err(AlertError::InvalidTransition {
                from: AlertStatus::Resolved,
                to: AlertStatus::Resolved,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlertError {
    #[error("alert cannot move from {} to {}", from.as_str(), to.as_str())]
    InvalidTransition { from: AlertStatus, to: AlertStatus },
}

/// A stored alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub product_id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub message: String,
    pub current_stock: i64,
    pub reorder_level: i64,
    pub suggested_quantity: Option<i64>,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Result of classifying a product's stock level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertClassification {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub suggested_quantity: Option<i64>,
}

/// Classify a total stock figure against the reorder level.
///
/// Products without a reorder level never alert.
pub fn classify_stock_level(
    total_stock: i64,
    reorder_level: i64,
    reorder_quantity: i64,
) -> Option<AlertClassification> {
    if reorder_level <= 0 || total_stock > reorder_level {
        return None;
    }

    let (alert_type, severity, suggested_quantity) = if total_stock <= 0 {
        (AlertType::OutOfStock, AlertSeverity::Critical, None)
    } else if total_stock.saturating_mul(2) < reorder_level {
        (AlertType::CriticalStock, AlertSeverity::High, None)
    } else if total_stock < reorder_level {
        (AlertType::LowStock, AlertSeverity::Medium, None)
    } else {
        let suggested = if reorder_quantity > 0 {
            reorder_quantity
        } else {
            reorder_level
        };
        (AlertType::ReorderSuggestion, AlertSeverity::Low, Some(suggested))
    };

    Some(AlertClassification {
        alert_type,
        severity,
        suggested_quantity,
    })
}

/// Stock figures the generator needs for one product
#[derive(Debug, Clone)]
pub struct StockLevel {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub total_stock: i64,
    pub reorder_level: i64,
    pub reorder_quantity: i64,
    pub is_active: bool,
}

/// An alert ready to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlert {
    pub product_id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub current_stock: i64,
    pub reorder_level: i64,
    pub suggested_quantity: Option<i64>,
}

/// Plan the alerts a scan should create.
///
/// `with_active_alert` holds products that already have an active monitored
/// alert; they are skipped.
pub fn plan_alerts(levels: &[StockLevel], with_active_alert: &HashSet<Uuid>) -> Vec<NewAlert> {
    levels
        .iter()
        .filter(|level| level.is_active && !with_active_alert.contains(&level.product_id))
        .filter_map(|level| {
            let class = classify_stock_level(
                level.total_stock,
                level.reorder_level,
                level.reorder_quantity,
            )?;
            Some(NewAlert {
                product_id: level.product_id,
                alert_type: class.alert_type,
                severity: class.severity,
                message: alert_message(level, &class),
                current_stock: level.total_stock,
                reorder_level: level.reorder_level,
                suggested_quantity: class.suggested_quantity,
            })
        })
        .collect()
}

fn alert_message(level: &StockLevel, class: &AlertClassification) -> String {
    match class.alert_type {
        AlertType::OutOfStock => format!("{} ({}) is out of stock", level.name, level.sku),
        AlertType::CriticalStock => format!(
            "{} ({}) is critically low: {} left, reorder level {}",
            level.name, level.sku, level.total_stock, level.reorder_level
        ),
        AlertType::LowStock => format!(
            "{} ({}) is below its reorder level: {} left, reorder level {}",
            level.name, level.sku, level.total_stock, level.reorder_level
        ),
        AlertType::ReorderSuggestion => format!(
            "{} ({}) reached its reorder level; suggest ordering {}",
            level.name,
            level.sku,
            class.suggested_quantity.unwrap_or(level.reorder_level)
        ),
    }
}
