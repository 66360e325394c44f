//! Receipt posting tests
//!
//! Scenario and property tests for receipts:
//! - receipts add stock at each line's location
//! - ledger rows reconcile and totals follow the per-location map
//! - a done receipt cannot be validated again

use proptest::prelude::*;
use shared::posting::{plan_receipt, PostingError, StockLine};
use shared::stock::{StockBook, StockMap};
use shared::{DocumentKind, DocumentStatus, MovementType, StatusError};
use uuid::Uuid;

fn book_with(product: Uuid, entries: &[(Uuid, i64)]) -> StockBook {
    let mut book = StockBook::new();
    book.insert(
        product,
        StockMap::from_entries(entries.iter().map(|(l, q)| (l.to_string(), *q))).unwrap(),
    );
    book
}

// ============================================================================
// Unit Tests
// ============================================================================

mod unit_tests {
    use super::*;

    #[test]
    fn test_receipt_adds_to_existing_stock() {
        let (p1, l1, w1) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut book = book_with(p1, &[(l1, 5)]);

        let postings = plan_receipt(
            w1,
            &[StockLine { product_id: p1, location_id: l1, quantity: 10 }],
            &mut book,
        )
        .unwrap();

        assert_eq!(book.quantity(p1, l1).unwrap(), 15);
        assert_eq!(book.stock(p1).unwrap().total(), 15);
        assert_eq!(postings.len(), 1);
        let row = &postings[0];
        assert_eq!(row.movement_type, MovementType::Receipt);
        assert_eq!((row.quantity, row.quantity_before, row.quantity_after), (10, 5, 15));
        assert_eq!(row.warehouse_id, w1);
    }

    #[test]
    fn test_receipt_into_new_location_creates_key() {
        let (p1, l1, l2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut book = book_with(p1, &[(l1, 4)]);

        plan_receipt(
            Uuid::new_v4(),
            &[StockLine { product_id: p1, location_id: l2, quantity: 6 }],
            &mut book,
        )
        .unwrap();

        let stock = book.stock(p1).unwrap();
        assert_eq!(stock.len(), 2);
        assert_eq!(stock.get(&l2.to_string()), 6);
        assert_eq!(stock.total(), 10);
    }

    #[test]
    fn test_same_product_twice_chains_before_after() {
        let (p1, l1) = (Uuid::new_v4(), Uuid::new_v4());
        let mut book = book_with(p1, &[]);
        let line = StockLine { product_id: p1, location_id: l1, quantity: 3 };

        let postings = plan_receipt(Uuid::new_v4(), &[line, line], &mut book).unwrap();

        assert_eq!(postings[0].quantity_after, postings[1].quantity_before);
        assert_eq!(postings[1].quantity_after, 6);
    }

    #[test]
    fn test_receipt_without_lines_is_rejected() {
        let mut book = StockBook::new();
        let err = plan_receipt(Uuid::new_v4(), &[], &mut book).unwrap_err();
        assert_eq!(err, PostingError::EmptyDocument);
    }

    #[test]
    fn test_zero_quantity_line_is_rejected_before_any_change() {
        let (p1, l1) = (Uuid::new_v4(), Uuid::new_v4());
        let mut book = book_with(p1, &[(l1, 2)]);

        let err = plan_receipt(
            Uuid::new_v4(),
            &[
                StockLine { product_id: p1, location_id: l1, quantity: 5 },
                StockLine { product_id: p1, location_id: l1, quantity: 0 },
            ],
            &mut book,
        )
        .unwrap_err();

        assert!(matches!(err, PostingError::NonPositiveQuantity { line: 1, quantity: 0 }));
        assert_eq!(book.quantity(p1, l1).unwrap(), 2);
        assert!(!book.is_dirty());
    }

    #[test]
    fn test_unloaded_product_rejects_whole_receipt() {
        let (p1, l1) = (Uuid::new_v4(), Uuid::new_v4());
        let missing = Uuid::new_v4();
        let mut book = book_with(p1, &[(l1, 1)]);

        let err = plan_receipt(
            Uuid::new_v4(),
            &[
                StockLine { product_id: p1, location_id: l1, quantity: 5 },
                StockLine { product_id: missing, location_id: l1, quantity: 5 },
            ],
            &mut book,
        )
        .unwrap_err();

        assert_eq!(err, PostingError::UnknownProduct(missing));
        assert_eq!(book.quantity(p1, l1).unwrap(), 1);
    }

    #[test]
    fn test_done_receipt_cannot_be_validated_again() {
        let err = DocumentKind::Receipt
            .transition(DocumentStatus::Done, DocumentStatus::Done)
            .unwrap_err();
        assert_eq!(err, StatusError::AlreadyValidated(DocumentKind::Receipt));
        assert_eq!(err.to_string(), "Receipt already validated");
    }

    #[test]
    fn test_receipt_lifecycle() {
        let kind = DocumentKind::Receipt;
        assert!(kind.allows(DocumentStatus::Draft, DocumentStatus::Waiting));
        assert!(kind.allows(DocumentStatus::Waiting, DocumentStatus::Ready));
        assert!(kind.allows(DocumentStatus::Ready, DocumentStatus::Done));
        assert!(kind.allows(DocumentStatus::Draft, DocumentStatus::Canceled));
        assert!(!kind.allows(DocumentStatus::Draft, DocumentStatus::Picking));
        assert!(!kind.allows(DocumentStatus::Canceled, DocumentStatus::Draft));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Every posting reconciles and the total follows the map
        #[test]
        fn prop_receipt_postings_reconcile(
            start in 0i64..1_000,
            quantities in prop::collection::vec(1i64..500, 1..10),
        ) {
            let (p1, l1) = (Uuid::new_v4(), Uuid::new_v4());
            let mut book = book_with(p1, &[(l1, start)]);
            let lines: Vec<StockLine> = quantities
                .iter()
                .map(|&quantity| StockLine { product_id: p1, location_id: l1, quantity })
                .collect();

            let postings = plan_receipt(Uuid::new_v4(), &lines, &mut book).unwrap();

            prop_assert_eq!(postings.len(), lines.len());
            for row in &postings {
                prop_assert_eq!(row.quantity_after, row.quantity_before + row.quantity);
                prop_assert!(row.quantity > 0);
            }
            let stock = book.stock(p1).unwrap();
            prop_assert_eq!(stock.total(), start + quantities.iter().sum::<i64>());
            prop_assert_eq!(stock.total(), stock.iter().map(|(_, q)| q).sum::<i64>());
        }

        /// A non-positive quantity anywhere leaves the book unchanged
        #[test]
        fn prop_invalid_line_rejects_all(
            start in 0i64..1_000,
            good in 1i64..100,
            bad in -100i64..=0,
        ) {
            let (p1, l1) = (Uuid::new_v4(), Uuid::new_v4());
            let mut book = book_with(p1, &[(l1, start)]);
            let lines = [
                StockLine { product_id: p1, location_id: l1, quantity: good },
                StockLine { product_id: p1, location_id: l1, quantity: bad },
            ];

            prop_assert!(plan_receipt(Uuid::new_v4(), &lines, &mut book).is_err());
            prop_assert_eq!(book.quantity(p1, l1).unwrap(), start);
            prop_assert!(!book.is_dirty());
        }
    }
}
