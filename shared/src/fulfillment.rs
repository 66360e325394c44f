//! Pick and pack bookkeeping for deliveries

use thiserror::Error;
use uuid::Uuid;

use crate::models::DocumentStatus;

/// Quantities tracked per delivery line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentLine {
    pub item_id: Uuid,
    pub quantity: i64,
    pub picked_quantity: i64,
    pub packed_quantity: i64,
}

/// A requested pick or pack for one line; `None` means the full quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineQuantity {
    pub item_id: Uuid,
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FulfillmentError {
    #[error("delivery item {0} not found")]
    UnknownItem(Uuid),

    #[error("quantity for item {item_id} cannot be negative, got {quantity}")]
    NegativeQuantity { item_id: Uuid, quantity: i64 },

    #[error("quantity for item {item_id} cannot exceed {limit}, got {quantity}")]
    ExceedsLimit {
        item_id: Uuid,
        quantity: i64,
        limit: i64,
    },
}

/// Pair each request with its line. `limit` bounds a line's quantity and is
/// also the default when a request names no quantity.
fn resolve(
    lines: &[FulfillmentLine],
    requests: &[LineQuantity],
    limit: impl Fn(&FulfillmentLine) -> i64,
) -> Result<Vec<(usize, i64)>, FulfillmentError> {
    if requests.is_empty() {
        return Ok(lines
            .iter()
            .enumerate()
            .map(|(idx, line)| (idx, limit(line)))
            .collect());
    }

    requests
        .iter()
        .map(|request| {
            let idx = lines
                .iter()
                .position(|line| line.item_id == request.item_id)
                .ok_or(FulfillmentError::UnknownItem(request.item_id))?;
            let max = limit(&lines[idx]);
            let quantity = request.quantity.unwrap_or(max);
            if quantity < 0 {
                return Err(FulfillmentError::NegativeQuantity {
                    item_id: request.item_id,
                    quantity,
                });
            }
            if quantity > max {
                return Err(FulfillmentError::ExceedsLimit {
                    item_id: request.item_id,
                    quantity,
                    limit: max,
                });
            }
            Ok((idx, quantity))
        })
        .collect()
}

/// Record picked quantities. An empty request picks every line in full.
///
/// A line cannot be picked beyond its requested quantity. Lines are only
/// changed when every request is valid.
pub fn record_picks(
    lines: &mut [FulfillmentLine],
    picks: &[LineQuantity],
) -> Result<(), FulfillmentError> {
    for (idx, quantity) in resolve(lines, picks, |line| line.quantity)? {
        lines[idx].picked_quantity = quantity;
    }
    Ok(())
}

/// Record packed quantities and return the status the delivery moves to.
///
/// Packing is bounded by what was picked; an empty request packs every line
/// at its picked quantity.
pub fn record_packs(
    lines: &mut [FulfillmentLine],
    packs: &[LineQuantity],
) -> Result<DocumentStatus, FulfillmentError> {
    for (idx, quantity) in resolve(lines, packs, |line| line.picked_quantity)? {
        lines[idx].packed_quantity = quantity;
    }
    Ok(packing_status(lines))
}

/// `ready` once every line is packed in full, otherwise `packing`
pub fn packing_status(lines: &[FulfillmentLine]) -> DocumentStatus {
    if !lines.is_empty() && lines.iter().all(|l| l.packed_quantity >= l.quantity) {
        DocumentStatus::Ready
    } else {
        DocumentStatus::Packing
    }
}
