//! Low stock alert tests
//!
//! - classification against the reorder level
//! - at most one new alert per product per scan, none while one is active
//! - acknowledge and resolve transitions

use std::collections::HashSet;

use proptest::prelude::*;
use shared::{
    classify_stock_level, plan_alerts, AlertSeverity, AlertStatus, AlertType, StockLevel,
};
use uuid::Uuid;

fn level(total_stock: i64, reorder_level: i64) -> StockLevel {
    StockLevel {
        product_id: Uuid::new_v4(),
        sku: "SKU-1".to_string(),
        name: "Widget".to_string(),
        total_stock,
        reorder_level,
        reorder_quantity: 0,
        is_active: true,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

mod unit_tests {
    use super::*;

    #[test]
    fn test_out_of_stock_creates_one_critical_alert() {
        let levels = vec![level(0, 10)];

        let first = plan_alerts(&levels, &HashSet::new());
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].alert_type, AlertType::OutOfStock);
        assert_eq!(first[0].severity, AlertSeverity::Critical);
        assert_eq!(first[0].current_stock, 0);
        assert_eq!(first[0].reorder_level, 10);

        let active: HashSet<Uuid> = first.iter().map(|a| a.product_id).collect();
        assert!(plan_alerts(&levels, &active).is_empty());
    }

    #[test]
    fn test_archived_products_never_alert() {
        let mut archived = level(0, 10);
        archived.is_active = false;
        assert!(plan_alerts(&[archived], &HashSet::new()).is_empty());
    }

    #[test]
    fn test_healthy_and_unconfigured_products_are_skipped() {
        let levels = vec![level(50, 10), level(0, 0)];
        assert!(plan_alerts(&levels, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_reorder_suggestion_falls_back_to_level() {
        let class = classify_stock_level(10, 10, 0).unwrap();
        assert_eq!(class.alert_type, AlertType::ReorderSuggestion);
        assert_eq!(class.suggested_quantity, Some(10));
    }

    #[test]
    fn test_message_names_the_product() {
        let alerts = plan_alerts(&[level(3, 10)], &HashSet::new());
        assert_eq!(alerts[0].alert_type, AlertType::CriticalStock);
        assert!(alerts[0].message.contains("Widget"));
        assert!(alerts[0].message.contains("SKU-1"));
    }

    #[test]
    fn test_alert_lifecycle() {
        let acknowledged = AlertStatus::Active.acknowledge().unwrap();
        let resolved = acknowledged.resolve().unwrap();
        assert_eq!(resolved, AlertStatus::Resolved);
        assert!(resolved.acknowledge().is_err());
        assert!(resolved.resolve().is_err());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Severity follows how far below the reorder level stock has fallen
        #[test]
        fn prop_classification_matches_thresholds(total in 0i64..200, reorder_level in 1i64..100) {
            match classify_stock_level(total, reorder_level, 0) {
                None => prop_assert!(total > reorder_level),
                Some(class) => {
                    prop_assert!(total <= reorder_level);
                    let expected = if total == 0 {
                        AlertType::OutOfStock
                    } else if total * 2 < reorder_level {
                        AlertType::CriticalStock
                    } else if total < reorder_level {
                        AlertType::LowStock
                    } else {
                        AlertType::ReorderSuggestion
                    };
                    prop_assert_eq!(class.alert_type, expected);
                }
            }
        }

        /// A second scan with the first scan's alerts active creates nothing
        #[test]
        fn prop_generation_is_deduplicated(
            figures in prop::collection::vec((0i64..50, 0i64..30), 1..20),
        ) {
            let levels: Vec<StockLevel> = figures.iter().map(|&(t, r)| level(t, r)).collect();

            let first = plan_alerts(&levels, &HashSet::new());
            let products: HashSet<Uuid> = first.iter().map(|a| a.product_id).collect();
            prop_assert_eq!(products.len(), first.len());

            prop_assert!(plan_alerts(&levels, &products).is_empty());
        }
    }
}
