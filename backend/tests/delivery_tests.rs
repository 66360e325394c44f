//! Delivery posting and fulfillment tests
//!
//! - a shortfall on any line rejects the whole delivery
//! - pick and pack progress through the delivery statuses

use proptest::prelude::*;
use shared::fulfillment::{
    packing_status, record_packs, record_picks, FulfillmentError, FulfillmentLine, LineQuantity,
};
use shared::posting::{plan_delivery, PostingError, StockLine};
use shared::stock::{StockBook, StockMap};
use shared::{DocumentKind, DocumentStatus, MovementType};
use uuid::Uuid;

fn book_with(entries: &[(Uuid, Uuid, i64)]) -> StockBook {
    let mut book = StockBook::new();
    for (product, location, quantity) in entries {
        let mut stock = book.stock(*product).cloned().unwrap_or_default();
        stock.set(&location.to_string(), *quantity).unwrap();
        book.insert(*product, stock);
    }
    book
}

fn line(quantity: i64) -> FulfillmentLine {
    FulfillmentLine {
        item_id: Uuid::new_v4(),
        quantity,
        picked_quantity: 0,
        packed_quantity: 0,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

mod unit_tests {
    use super::*;

    #[test]
    fn test_delivery_removes_stock() {
        let (p1, l1, w1) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut book = book_with(&[(p1, l1, 12)]);

        let postings = plan_delivery(
            w1,
            &[StockLine { product_id: p1, location_id: l1, quantity: 5 }],
            &mut book,
        )
        .unwrap();

        assert_eq!(book.quantity(p1, l1).unwrap(), 7);
        let row = &postings[0];
        assert_eq!(row.movement_type, MovementType::Delivery);
        assert_eq!((row.quantity, row.quantity_before, row.quantity_after), (-5, 12, 7));
    }

    #[test]
    fn test_over_delivery_is_rejected_and_stock_kept() {
        let (p1, l1) = (Uuid::new_v4(), Uuid::new_v4());
        let mut book = book_with(&[(p1, l1, 5)]);

        let err = plan_delivery(
            Uuid::new_v4(),
            &[StockLine { product_id: p1, location_id: l1, quantity: 8 }],
            &mut book,
        )
        .unwrap_err();

        assert_eq!(
            err,
            PostingError::InsufficientStock {
                product_id: p1,
                location_id: l1,
                available: 5,
                requested: 8,
            }
        );
        assert_eq!(book.quantity(p1, l1).unwrap(), 5);
        assert!(!book.is_dirty());
    }

    #[test]
    fn test_shortfall_on_second_line_undoes_first() {
        let (p1, p2, l1) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut book = book_with(&[(p1, l1, 10), (p2, l1, 1)]);

        let result = plan_delivery(
            Uuid::new_v4(),
            &[
                StockLine { product_id: p1, location_id: l1, quantity: 4 },
                StockLine { product_id: p2, location_id: l1, quantity: 2 },
            ],
            &mut book,
        );

        assert!(result.is_err());
        assert_eq!(book.quantity(p1, l1).unwrap(), 10);
        assert_eq!(book.quantity(p2, l1).unwrap(), 1);
    }

    #[test]
    fn test_delivering_everything_removes_location_key() {
        let (p1, l1) = (Uuid::new_v4(), Uuid::new_v4());
        let mut book = book_with(&[(p1, l1, 3)]);

        plan_delivery(
            Uuid::new_v4(),
            &[StockLine { product_id: p1, location_id: l1, quantity: 3 }],
            &mut book,
        )
        .unwrap();

        assert!(book.stock(p1).unwrap().is_empty());
        assert_eq!(book.stock(p1).unwrap().total(), 0);
    }

    #[test]
    fn test_empty_pick_takes_full_lines() {
        let mut lines = vec![line(4), line(6)];
        record_picks(&mut lines, &[]).unwrap();
        assert!(lines.iter().all(|l| l.picked_quantity == l.quantity));
    }

    #[test]
    fn test_partial_pack_stays_packing() {
        let mut lines = vec![line(4), line(6)];
        record_picks(&mut lines, &[]).unwrap();
        let first = lines[0].item_id;

        let status = record_packs(
            &mut lines,
            &[LineQuantity { item_id: first, quantity: None }],
        )
        .unwrap();

        assert_eq!(status, DocumentStatus::Packing);
        assert_eq!(lines[0].packed_quantity, 4);
        assert_eq!(lines[1].packed_quantity, 0);
    }

    #[test]
    fn test_full_pack_is_ready() {
        let mut lines = vec![line(4), line(6)];
        record_picks(&mut lines, &[]).unwrap();
        let status = record_packs(&mut lines, &[]).unwrap();
        assert_eq!(status, DocumentStatus::Ready);
        assert_eq!(packing_status(&lines), DocumentStatus::Ready);
    }

    #[test]
    fn test_over_pick_is_rejected() {
        let mut lines = vec![line(5)];
        let id = lines[0].item_id;

        let result = record_picks(
            &mut lines,
            &[LineQuantity { item_id: id, quantity: Some(1000) }],
        );

        assert!(matches!(result, Err(FulfillmentError::ExceedsLimit { limit: 5, .. })));
        assert_eq!(lines[0].picked_quantity, 0);
    }

    #[test]
    fn test_short_pick_cannot_reach_ready() {
        let mut lines = vec![line(5)];
        let id = lines[0].item_id;
        record_picks(&mut lines, &[LineQuantity { item_id: id, quantity: Some(2) }]).unwrap();

        let over = record_packs(&mut lines, &[LineQuantity { item_id: id, quantity: Some(5) }]);
        assert!(matches!(over, Err(FulfillmentError::ExceedsLimit { limit: 2, .. })));

        let status = record_packs(&mut lines, &[]).unwrap();
        assert_eq!(lines[0].packed_quantity, 2);
        assert_eq!(status, DocumentStatus::Packing);
    }

    #[test]
    fn test_unknown_item_changes_nothing() {
        let mut lines = vec![line(4)];
        let known = lines[0].item_id;
        let stranger = Uuid::new_v4();

        let result = record_picks(
            &mut lines,
            &[
                LineQuantity { item_id: known, quantity: Some(2) },
                LineQuantity { item_id: stranger, quantity: Some(1) },
            ],
        );

        assert!(result.is_err());
        assert_eq!(lines[0].picked_quantity, 0);
    }

    #[test]
    fn test_delivery_lifecycle() {
        let kind = DocumentKind::Delivery;
        assert!(kind.allows(DocumentStatus::Draft, DocumentStatus::Waiting));
        assert!(kind.allows(DocumentStatus::Waiting, DocumentStatus::Picking));
        assert!(kind.allows(DocumentStatus::Picking, DocumentStatus::Packing));
        assert!(kind.allows(DocumentStatus::Packing, DocumentStatus::Ready));
        assert!(kind.allows(DocumentStatus::Ready, DocumentStatus::Done));
        assert!(!kind.allows(DocumentStatus::Ready, DocumentStatus::Picking));
        assert!(kind.transition(DocumentStatus::Done, DocumentStatus::Canceled).is_err());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Either every line posts or the book is untouched; stock never goes negative
        #[test]
        fn prop_delivery_all_or_nothing(
            on_hand in 0i64..200,
            quantities in prop::collection::vec(1i64..80, 1..6),
        ) {
            let (p1, l1) = (Uuid::new_v4(), Uuid::new_v4());
            let mut book = book_with(&[(p1, l1, on_hand)]);
            let lines: Vec<StockLine> = quantities
                .iter()
                .map(|&quantity| StockLine { product_id: p1, location_id: l1, quantity })
                .collect();
            let requested: i64 = quantities.iter().sum();

            match plan_delivery(Uuid::new_v4(), &lines, &mut book) {
                Ok(postings) => {
                    prop_assert!(requested <= on_hand);
                    prop_assert_eq!(book.quantity(p1, l1).unwrap(), on_hand - requested);
                    for row in &postings {
                        prop_assert!(row.quantity_after >= 0);
                        prop_assert_eq!(row.quantity_after, row.quantity_before + row.quantity);
                    }
                }
                Err(err) => {
                    prop_assert!(requested > on_hand);
                    let is_shortfall = matches!(err, PostingError::InsufficientStock { .. });
                    prop_assert!(is_shortfall);
                    prop_assert_eq!(book.quantity(p1, l1).unwrap(), on_hand);
                    prop_assert!(!book.is_dirty());
                }
            }
        }

        /// Packing status is ready exactly when every line is fully packed
        #[test]
        fn prop_ready_only_when_fully_packed(
            quantities in prop::collection::vec(1i64..20, 1..6),
            packed_in_full in prop::collection::vec(any::<bool>(), 6),
        ) {
            let mut lines: Vec<FulfillmentLine> = quantities.iter().map(|&q| line(q)).collect();
            record_picks(&mut lines, &[]).unwrap();
            let packs: Vec<LineQuantity> = lines
                .iter()
                .zip(&packed_in_full)
                .map(|(l, &full)| LineQuantity {
                    item_id: l.item_id,
                    quantity: Some(if full { l.quantity } else { l.quantity - 1 }),
                })
                .collect();

            let status = record_packs(&mut lines, &packs).unwrap();
            let all_full = packed_in_full.iter().take(lines.len()).all(|&f| f);
            let expected = if all_full { DocumentStatus::Ready } else { DocumentStatus::Packing };
            prop_assert_eq!(status, expected);
        }
    }
}
