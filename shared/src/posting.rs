//! Posting planners for the four movement types
//!
//! A planner takes the lines of a document and a [`StockBook`] loaded with
//! fresh stock for every referenced product. It either applies all lines
//! and returns one [`Posting`] per ledger row, or returns an error and
//! leaves the book untouched.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{MovementType, TransferRoute};
use crate::stock::{StockBook, StockChange, StockError};

/// A ledger row computed by a planner, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Posting {
    pub movement_type: MovementType,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub location_id: Uuid,
    pub quantity: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub route: Option<TransferRoute>,
}

impl Posting {
    fn new(
        movement_type: MovementType,
        product_id: Uuid,
        warehouse_id: Uuid,
        location_id: Uuid,
        change: StockChange,
    ) -> Self {
        Self {
            movement_type,
            product_id,
            warehouse_id,
            location_id,
            quantity: change.quantity,
            quantity_before: change.before,
            quantity_after: change.after,
            route: None,
        }
    }
}

/// A (product, location, quantity) line of a receipt or delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub quantity: i64,
}

/// A line of a transfer; locations come from the route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLine {
    pub product_id: Uuid,
    pub quantity: i64,
}

/// A physical count at (product, location)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountLine {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub counted_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostingError {
    #[error("document has no lines")]
    EmptyDocument,

    #[error("line {line}: quantity must be positive, got {quantity}")]
    NonPositiveQuantity { line: usize, quantity: i64 },

    #[error("counted quantity cannot be negative, got {0}")]
    NegativeCount(i64),

    #[error("source and destination locations must differ")]
    SameLocation,

    #[error("product {0} not found")]
    UnknownProduct(Uuid),

    #[error(
        "insufficient stock for product {product_id} at location {location_id}: \
         available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: Uuid,
        location_id: Uuid,
        available: i64,
        requested: i64,
    },

    #[error("line {line}: {source}")]
    Stock {
        line: usize,
        #[source]
        source: StockError,
    },
}

impl PostingError {
    fn from_stock(line: usize, product_id: Uuid, location_id: Uuid, err: StockError) -> Self {
        match err {
            StockError::InsufficientStock {
                available,
                requested,
            } => PostingError::InsufficientStock {
                product_id,
                location_id,
                available,
                requested,
            },
            StockError::UnknownProduct(id) => PostingError::UnknownProduct(id),
            other => PostingError::Stock {
                line,
                source: other,
            },
        }
    }
}

/// At least one line, every quantity positive
pub fn check_quantities<I>(quantities: I) -> Result<(), PostingError>
where
    I: IntoIterator<Item = i64>,
{
    let mut seen = false;
    for (line, quantity) in quantities.into_iter().enumerate() {
        seen = true;
        if quantity <= 0 {
            return Err(PostingError::NonPositiveQuantity { line, quantity });
        }
    }
    if seen {
        Ok(())
    } else {
        Err(PostingError::EmptyDocument)
    }
}

/// Run `plan` against a copy of the book and keep the copy only on success
fn all_or_nothing<T, F>(book: &mut StockBook, plan: F) -> Result<T, PostingError>
where
    F: FnOnce(&mut StockBook) -> Result<T, PostingError>,
{
    let mut working = book.clone();
    let planned = plan(&mut working)?;
    *book = working;
    Ok(planned)
}

fn post_lines(
    movement_type: MovementType,
    warehouse_id: Uuid,
    lines: &[StockLine],
    sign: i64,
    book: &mut StockBook,
) -> Result<Vec<Posting>, PostingError> {
    check_quantities(lines.iter().map(|l| l.quantity))?;

    all_or_nothing(book, |book| {
        lines
            .iter()
            .enumerate()
            .map(|(idx, line)| {
                book.apply(line.product_id, line.location_id, sign * line.quantity)
                    .map(|change| {
                        Posting::new(
                            movement_type,
                            line.product_id,
                            warehouse_id,
                            line.location_id,
                            change,
                        )
                    })
                    .map_err(|e| {
                        PostingError::from_stock(idx, line.product_id, line.location_id, e)
                    })
            })
            .collect()
    })
}

/// Receipt: each line adds its quantity at its location
pub fn plan_receipt(
    warehouse_id: Uuid,
    lines: &[StockLine],
    book: &mut StockBook,
) -> Result<Vec<Posting>, PostingError> {
    post_lines(MovementType::Receipt, warehouse_id, lines, 1, book)
}

/// Delivery: each line removes its quantity; any shortfall rejects all lines
pub fn plan_delivery(
    warehouse_id: Uuid,
    lines: &[StockLine],
    book: &mut StockBook,
) -> Result<Vec<Posting>, PostingError> {
    post_lines(MovementType::Delivery, warehouse_id, lines, -1, book)
}

/// Transfer: two postings per line, source decrease first
pub fn plan_transfer(
    route: TransferRoute,
    lines: &[TransferLine],
    book: &mut StockBook,
) -> Result<Vec<Posting>, PostingError> {
    if route.source_location_id == route.destination_location_id {
        return Err(PostingError::SameLocation);
    }
    check_quantities(lines.iter().map(|l| l.quantity))?;

    all_or_nothing(book, |book| {
        let mut postings = Vec::with_capacity(lines.len() * 2);
        for (idx, line) in lines.iter().enumerate() {
            let out = book
                .apply(line.product_id, route.source_location_id, -line.quantity)
                .map_err(|e| {
                    PostingError::from_stock(idx, line.product_id, route.source_location_id, e)
                })?;
            let into = book
                .apply(line.product_id, route.destination_location_id, line.quantity)
                .map_err(|e| {
                    PostingError::from_stock(
                        idx,
                        line.product_id,
                        route.destination_location_id,
                        e,
                    )
                })?;

            let mut source = Posting::new(
                MovementType::Transfer,
                line.product_id,
                route.source_warehouse_id,
                route.source_location_id,
                out,
            );
            source.route = Some(route);

            let mut destination = Posting::new(
                MovementType::Transfer,
                line.product_id,
                route.destination_warehouse_id,
                route.destination_location_id,
                into,
            );
            destination.route = Some(route);

            postings.push(source);
            postings.push(destination);
        }
        Ok(postings)
    })
}

/// Adjustment: set the location to the counted quantity.
///
/// The posted quantity is re-derived from the stock in the book, so it
/// always equals `counted - before`.
pub fn plan_adjustment(
    warehouse_id: Uuid,
    line: CountLine,
    book: &mut StockBook,
) -> Result<Posting, PostingError> {
    if line.counted_quantity < 0 {
        return Err(PostingError::NegativeCount(line.counted_quantity));
    }

    all_or_nothing(book, |book| {
        book.set(line.product_id, line.location_id, line.counted_quantity)
            .map(|change| {
                Posting::new(
                    MovementType::Adjustment,
                    line.product_id,
                    warehouse_id,
                    line.location_id,
                    change,
                )
            })
            .map_err(|e| PostingError::from_stock(0, line.product_id, line.location_id, e))
    })
}
