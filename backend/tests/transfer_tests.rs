//! Transfer execution tests
//!
//! Each transfer line yields a paired decrease at the source and increase
//! at the destination; stock is conserved across the system.

use proptest::prelude::*;
use shared::posting::{plan_transfer, PostingError, TransferLine};
use shared::stock::{StockBook, StockMap};
use shared::{DocumentKind, DocumentStatus, TransferRoute};
use uuid::Uuid;

fn route() -> TransferRoute {
    TransferRoute {
        source_warehouse_id: Uuid::new_v4(),
        source_location_id: Uuid::new_v4(),
        destination_warehouse_id: Uuid::new_v4(),
        destination_location_id: Uuid::new_v4(),
    }
}

fn book_at(product: Uuid, route: &TransferRoute, source: i64, destination: i64) -> StockBook {
    let mut book = StockBook::new();
    book.insert(
        product,
        StockMap::from_entries([
            (route.source_location_id.to_string(), source),
            (route.destination_location_id.to_string(), destination),
        ])
        .unwrap(),
    );
    book
}

// ============================================================================
// Unit Tests
// ============================================================================

mod unit_tests {
    use super::*;

    #[test]
    fn test_transfer_moves_stock_between_warehouses() {
        let p1 = Uuid::new_v4();
        let route = route();
        let mut book = book_at(p1, &route, 10, 0);

        let postings = plan_transfer(
            route,
            &[TransferLine { product_id: p1, quantity: 3 }],
            &mut book,
        )
        .unwrap();

        assert_eq!(book.quantity(p1, route.source_location_id).unwrap(), 7);
        assert_eq!(book.quantity(p1, route.destination_location_id).unwrap(), 3);
        assert_eq!(book.stock(p1).unwrap().total(), 10);

        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].location_id, route.source_location_id);
        assert_eq!(postings[0].warehouse_id, route.source_warehouse_id);
        assert_eq!(postings[0].quantity, -3);
        assert_eq!(postings[1].location_id, route.destination_location_id);
        assert_eq!(postings[1].warehouse_id, route.destination_warehouse_id);
        assert_eq!(postings[1].quantity, 3);
        assert!(postings.iter().all(|p| p.route == Some(route)));
    }

    #[test]
    fn test_same_location_is_rejected() {
        let p1 = Uuid::new_v4();
        let mut route = route();
        route.destination_location_id = route.source_location_id;
        let mut book = book_at(p1, &route, 10, 0);

        let err = plan_transfer(
            route,
            &[TransferLine { product_id: p1, quantity: 1 }],
            &mut book,
        )
        .unwrap_err();

        assert_eq!(err, PostingError::SameLocation);
    }

    #[test]
    fn test_over_transfer_is_rejected_before_any_change() {
        let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
        let route = route();
        let mut book = book_at(p1, &route, 10, 0);
        book.insert(
            p2,
            StockMap::from_entries([(route.source_location_id.to_string(), 1)]).unwrap(),
        );

        let err = plan_transfer(
            route,
            &[
                TransferLine { product_id: p1, quantity: 5 },
                TransferLine { product_id: p2, quantity: 2 },
            ],
            &mut book,
        )
        .unwrap_err();

        assert!(matches!(err, PostingError::InsufficientStock { available: 1, requested: 2, .. }));
        assert_eq!(book.quantity(p1, route.source_location_id).unwrap(), 10);
        assert_eq!(book.quantity(p1, route.destination_location_id).unwrap(), 0);
        assert!(!book.is_dirty());
    }

    #[test]
    fn test_transfer_lifecycle() {
        let kind = DocumentKind::Transfer;
        assert!(kind.allows(DocumentStatus::Draft, DocumentStatus::Waiting));
        assert!(kind.allows(DocumentStatus::Waiting, DocumentStatus::Done));
        assert!(!kind.allows(DocumentStatus::Draft, DocumentStatus::Ready));
        assert!(kind.transition(DocumentStatus::Done, DocumentStatus::Done).is_err());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Two postings per line, inverse quantities, total unchanged
        #[test]
        fn prop_transfer_pairs_and_conserves(
            source in 0i64..500,
            destination in 0i64..500,
            quantities in prop::collection::vec(1i64..60, 1..6),
        ) {
            let p1 = Uuid::new_v4();
            let route = route();
            let mut book = book_at(p1, &route, source, destination);
            let lines: Vec<TransferLine> = quantities
                .iter()
                .map(|&quantity| TransferLine { product_id: p1, quantity })
                .collect();
            let moved: i64 = quantities.iter().sum();

            match plan_transfer(route, &lines, &mut book) {
                Ok(postings) => {
                    prop_assert_eq!(postings.len(), lines.len() * 2);
                    for pair in postings.chunks(2) {
                        prop_assert_eq!(pair[0].quantity, -pair[1].quantity);
                    }
                    let delta: i64 = postings.iter().map(|p| p.quantity).sum();
                    prop_assert_eq!(delta, 0);
                    prop_assert_eq!(book.stock(p1).unwrap().total(), source + destination);
                    prop_assert_eq!(
                        book.quantity(p1, route.destination_location_id).unwrap(),
                        destination + moved
                    );
                }
                Err(_) => {
                    prop_assert!(moved > source);
                    prop_assert_eq!(book.quantity(p1, route.source_location_id).unwrap(), source);
                    prop_assert_eq!(
                        book.quantity(p1, route.destination_location_id).unwrap(),
                        destination
                    );
                }
            }
        }
    }
}
