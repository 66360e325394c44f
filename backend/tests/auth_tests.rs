//! Role, warehouse scope and input validation tests

use proptest::prelude::*;
use shared::{
    normalize_code, normalize_sku, validate_code, validate_email, validate_password,
    validate_reorder_settings, validate_sku, UserRole,
};
use uuid::Uuid;

// ============================================================================
// Role Permission Tests
// ============================================================================

mod role_permission_tests {
    use super::*;

    #[test]
    fn test_only_admin_manages_users() {
        assert!(UserRole::Admin.can_manage_users());
        assert!(!UserRole::Manager.can_manage_users());
        assert!(!UserRole::Warehouse.can_manage_users());
    }

    #[test]
    fn test_catalog_and_alerts_need_manager() {
        for role in [UserRole::Admin, UserRole::Manager] {
            assert!(role.can_manage_catalog());
            assert!(role.can_manage_alerts());
        }
        assert!(!UserRole::Warehouse.can_manage_catalog());
        assert!(!UserRole::Warehouse.can_manage_alerts());
    }

    #[test]
    fn test_warehouse_staff_scoped_to_assignment() {
        let (own, other) = (Uuid::new_v4(), Uuid::new_v4());
        let role = UserRole::Warehouse;
        assert!(role.permits_warehouse(Some(own), own));
        assert!(!role.permits_warehouse(Some(own), other));
        assert!(!role.permits_warehouse(None, own));
    }

    #[test]
    fn test_transfer_scope_needs_both_ends() {
        let (own, other) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(UserRole::Warehouse.permits_all(Some(own), &[own, own]));
        assert!(!UserRole::Warehouse.permits_all(Some(own), &[own, other]));
        assert!(UserRole::Manager.permits_all(None, &[own, other]));
    }

    #[test]
    fn test_role_names_round_trip() {
        for role in [UserRole::Admin, UserRole::Manager, UserRole::Warehouse] {
            assert_eq!(UserRole::from_str(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::from_str("owner"), None);
    }
}

// ============================================================================
// Input Validation Tests
// ============================================================================

mod validation_tests {
    use super::*;

    #[test]
    fn test_sku_rules() {
        assert_eq!(normalize_sku(" abc-1 "), "ABC-1");
        assert!(validate_sku("ABC-1.2_X").is_ok());
        assert!(validate_sku("").is_err());
        assert!(validate_sku("ABC 1").is_err());
        assert!(validate_sku(&"A".repeat(33)).is_err());
    }

    #[test]
    fn test_code_rules() {
        assert_eq!(normalize_code(" wh-a "), "WH-A");
        assert!(validate_code("WH-A").is_ok());
        assert!(validate_code("WH_A").is_err());
    }

    #[test]
    fn test_reorder_rules() {
        assert!(validate_reorder_settings(10, 20, Some(100)).is_ok());
        assert!(validate_reorder_settings(-1, 0, None).is_err());
        assert!(validate_reorder_settings(10, 0, Some(5)).is_err());
    }

    #[test]
    fn test_account_rules() {
        assert!(validate_email("ops@example.com").is_ok());
        assert!(validate_email("ops").is_err());
        assert!(validate_password("long-enough").is_ok());
        assert!(validate_password("short").is_err());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Normalized SKUs made of allowed characters always validate
    #[test]
    fn prop_normalized_sku_is_valid(raw in "[a-zA-Z0-9._-]{1,32}") {
        let sku = normalize_sku(&raw);
        prop_assert!(validate_sku(&sku).is_ok());
    }

    /// Admins and managers reach every warehouse
    #[test]
    fn prop_managers_are_unscoped(ids in prop::collection::vec(any::<u128>(), 1..5)) {
        let ids: Vec<Uuid> = ids.into_iter().map(Uuid::from_u128).collect();
        prop_assert!(UserRole::Admin.permits_all(None, &ids));
        prop_assert!(UserRole::Manager.permits_all(None, &ids));
    }
}
