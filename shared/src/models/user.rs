//! User and role models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    /// Assigned warehouse, required for the warehouse role
    pub warehouse_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Roles allowed to use the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Manager,
    /// Warehouse staff, scoped to a single warehouse
    Warehouse,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
            UserRole::Warehouse => "warehouse",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "manager" => Some(UserRole::Manager),
            "warehouse" => Some(UserRole::Warehouse),
            _ => None,
        }
    }

    pub fn can_manage_users(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    /// Products, warehouses and locations
    pub fn can_manage_catalog(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Manager)
    }

    /// Acknowledge and resolve alerts
    pub fn can_manage_alerts(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Manager)
    }

    /// Whether a user with this role and assignment may act on a warehouse
    pub fn permits_warehouse(&self, assigned: Option<Uuid>, warehouse_id: Uuid) -> bool {
        match self {
            UserRole::Admin | UserRole::Manager => true,
            UserRole::Warehouse => assigned == Some(warehouse_id),
        }
    }

    /// Same as [`permits_warehouse`](Self::permits_warehouse) for every id given
    pub fn permits_all(&self, assigned: Option<Uuid>, warehouse_ids: &[Uuid]) -> bool {
        warehouse_ids
            .iter()
            .all(|id| self.permits_warehouse(assigned, *id))
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_managers_reach_every_warehouse() {
        let w = Uuid::new_v4();
        assert!(UserRole::Admin.permits_warehouse(None, w));
        assert!(UserRole::Manager.permits_warehouse(Some(Uuid::new_v4()), w));
    }

    #[test]
    fn test_warehouse_staff_scoped_by_equality() {
        let own = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(UserRole::Warehouse.permits_warehouse(Some(own), own));
        assert!(!UserRole::Warehouse.permits_warehouse(Some(own), other));
        assert!(!UserRole::Warehouse.permits_warehouse(None, own));
    }

    #[test]
    fn test_warehouse_staff_cross_warehouse_transfer_denied() {
        let own = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(UserRole::Warehouse.permits_all(Some(own), &[own, own]));
        assert!(!UserRole::Warehouse.permits_all(Some(own), &[own, other]));
        assert!(UserRole::Manager.permits_all(Some(own), &[own, other]));
    }

    #[test]
    fn test_role_capabilities() {
        assert!(UserRole::Admin.can_manage_users());
        assert!(!UserRole::Manager.can_manage_users());
        assert!(UserRole::Manager.can_manage_alerts());
        assert!(!UserRole::Warehouse.can_manage_catalog());
    }
}
