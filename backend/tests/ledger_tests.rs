//! Ledger and stock book invariants across mixed movement sequences
//!
//! - totals always equal the sum of per-location quantities
//! - no location ever holds negative stock
//! - every posting reconciles
//! - terminal documents reject further transitions

use proptest::prelude::*;
use shared::posting::{
    plan_adjustment, plan_delivery, plan_receipt, plan_transfer, CountLine, Posting, StockLine,
    TransferLine,
};
use shared::stock::{apply_movement, StockBook, StockError, StockMap};
use shared::{document_number, DocumentKind, DocumentStatus, TransferRoute};
use uuid::Uuid;

#[derive(Debug, Clone)]
enum Movement {
    Receive { location: usize, quantity: i64 },
    Deliver { location: usize, quantity: i64 },
    Transfer { from: usize, to: usize, quantity: i64 },
    Count { location: usize, counted: i64 },
}

fn movement_strategy() -> impl Strategy<Value = Movement> {
    prop_oneof![
        (0usize..3, 1i64..100).prop_map(|(location, quantity)| Movement::Receive { location, quantity }),
        (0usize..3, 1i64..100).prop_map(|(location, quantity)| Movement::Deliver { location, quantity }),
        (0usize..3, 0usize..3, 1i64..100)
            .prop_map(|(from, to, quantity)| Movement::Transfer { from, to, quantity }),
        (0usize..3, 0i64..150).prop_map(|(location, counted)| Movement::Count { location, counted }),
    ]
}

/// Run one movement; `None` when the planner rejected it
fn run(
    movement: &Movement,
    product: Uuid,
    warehouse: Uuid,
    locations: &[Uuid],
    book: &mut StockBook,
) -> Option<Vec<Posting>> {
    match *movement {
        Movement::Receive { location, quantity } => plan_receipt(
            warehouse,
            &[StockLine { product_id: product, location_id: locations[location], quantity }],
            book,
        )
        .ok(),
        Movement::Deliver { location, quantity } => plan_delivery(
            warehouse,
            &[StockLine { product_id: product, location_id: locations[location], quantity }],
            book,
        )
        .ok(),
        Movement::Transfer { from, to, quantity } => plan_transfer(
            TransferRoute {
                source_warehouse_id: warehouse,
                source_location_id: locations[from],
                destination_warehouse_id: warehouse,
                destination_location_id: locations[to],
            },
            &[TransferLine { product_id: product, quantity }],
            book,
        )
        .ok(),
        Movement::Count { location, counted } => plan_adjustment(
            warehouse,
            CountLine { product_id: product, location_id: locations[location], counted_quantity: counted },
            book,
        )
        .ok()
        .map(|posting| vec![posting]),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

mod unit_tests {
    use super::*;

    #[test]
    fn test_apply_movement_reconciles() {
        let change = apply_movement(5, -3).unwrap();
        assert_eq!((change.before, change.quantity, change.after), (5, -3, 2));
    }

    #[test]
    fn test_apply_movement_rejects_negative_result() {
        assert_eq!(
            apply_movement(5, -8),
            Err(StockError::InsufficientStock { available: 5, requested: 8 })
        );
    }

    #[test]
    fn test_stock_map_rejects_negative_entries() {
        assert!(StockMap::from_entries([("L1".to_string(), -1)]).is_err());
    }

    #[test]
    fn test_stock_map_serializes_as_plain_object() {
        let map = StockMap::from_entries([("L1".to_string(), 4), ("L2".to_string(), 0)]).unwrap();
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json, serde_json::json!({ "L1": 4 }));
    }

    #[test]
    fn test_document_numbers() {
        assert_eq!(document_number(DocumentKind::Receipt, 42), "RCP-00042");
        assert_eq!(document_number(DocumentKind::Delivery, 1), "DLV-00001");
        assert_eq!(document_number(DocumentKind::Transfer, 7), "TRF-00007");
        assert_eq!(document_number(DocumentKind::Adjustment, 123_456), "ADJ-123456");
    }

    #[test]
    fn test_terminal_statuses_have_no_exit() {
        let kinds = [
            DocumentKind::Receipt,
            DocumentKind::Delivery,
            DocumentKind::Transfer,
            DocumentKind::Adjustment,
        ];
        for kind in kinds {
            for &to in kind.statuses() {
                assert!(!kind.allows(DocumentStatus::Done, to));
                assert!(!kind.allows(DocumentStatus::Canceled, to));
            }
        }
    }

    #[test]
    fn test_dirty_products_are_tracked() {
        let (p1, p2, l1) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut book = StockBook::new();
        book.insert(p1, StockMap::new());
        book.insert(p2, StockMap::new());

        book.apply(p1, l1, 5).unwrap();

        let dirty: Vec<Uuid> = book.dirty().map(|(id, _)| id).collect();
        assert_eq!(dirty, vec![p1]);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Any sequence of movements keeps the book consistent
        #[test]
        fn prop_invariants_hold_over_any_sequence(
            movements in prop::collection::vec(movement_strategy(), 1..40),
        ) {
            let product = Uuid::new_v4();
            let warehouse = Uuid::new_v4();
            let locations = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
            let mut book = StockBook::new();
            book.insert(product, StockMap::new());

            for movement in &movements {
                let before = book.stock(product).unwrap().clone();

                match run(movement, product, warehouse, &locations, &mut book) {
                    Some(postings) => {
                        for row in &postings {
                            prop_assert_eq!(row.quantity_after, row.quantity_before + row.quantity);
                            prop_assert!(row.quantity_after >= 0);
                        }
                        let delta: i64 = postings.iter().map(|p| p.quantity).sum();
                        prop_assert_eq!(book.stock(product).unwrap().total(), before.total() + delta);
                    }
                    None => {
                        prop_assert_eq!(book.stock(product).unwrap(), &before);
                    }
                }

                let stock = book.stock(product).unwrap();
                prop_assert_eq!(stock.total(), stock.iter().map(|(_, q)| q).sum::<i64>());
                prop_assert!(stock.iter().all(|(_, q)| q > 0));
            }
        }

        /// A finished document never transitions again
        #[test]
        fn prop_done_is_terminal(target in prop::sample::select(vec![
            DocumentStatus::Draft,
            DocumentStatus::Waiting,
            DocumentStatus::Ready,
            DocumentStatus::Done,
            DocumentStatus::Canceled,
        ])) {
            prop_assert!(DocumentKind::Receipt.transition(DocumentStatus::Done, target).is_err());
            prop_assert!(DocumentKind::Receipt.transition(DocumentStatus::Canceled, target).is_err());
        }
    }
}
