//! Per-location stock quantities and the movement arithmetic
//!
//! Every stock change in the system goes through [`apply_movement`]. The
//! resulting [`StockChange`] feeds both the stock write and the ledger row,
//! so before/after values are computed exactly once.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by stock arithmetic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("stock quantity cannot be negative: {0}")]
    NegativeQuantity(i64),

    #[error("stock quantity overflow")]
    Overflow,

    #[error("product {0} is not loaded")]
    UnknownProduct(Uuid),
}

/// Outcome of one movement at one (product, location)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub before: i64,
    pub after: i64,
    /// Signed delta, negative for decreases
    pub quantity: i64,
}

/// Apply a signed delta to a current quantity.
///
/// Fails with [`StockError::InsufficientStock`] when the result would be
/// negative. `after == before + quantity` holds for every returned change.
pub fn apply_movement(current: i64, delta: i64) -> Result<StockChange, StockError> {
    if current < 0 {
        return Err(StockError::NegativeQuantity(current));
    }

    let after = current.checked_add(delta).ok_or(StockError::Overflow)?;
    if after < 0 {
        return Err(StockError::InsufficientStock {
            available: current,
            requested: delta.saturating_neg(),
        });
    }

    Ok(StockChange {
        before: current,
        after,
        quantity: delta,
    })
}

/// Stock held by one product, keyed by location id.
///
/// The map only exposes accessors; `total` is recomputed on every write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockMap {
    entries: BTreeMap<String, i64>,
    total: i64,
}

impl StockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from raw entries, rejecting negative quantities
    pub fn from_entries<I, K>(entries: I) -> Result<Self, StockError>
    where
        I: IntoIterator<Item = (K, i64)>,
        K: Into<String>,
    {
        let mut map = Self::new();
        for (location, quantity) in entries {
            let location: String = location.into();
            map.set(&location, quantity)?;
        }
        Ok(map)
    }

    /// Quantity at a location, zero when absent
    pub fn get(&self, location: &str) -> i64 {
        self.entries.get(location).copied().unwrap_or(0)
    }

    /// Set the quantity at a location and recompute the total.
    ///
    /// A zero quantity removes the location key.
    pub fn set(&mut self, location: &str, quantity: i64) -> Result<(), StockError> {
        if quantity < 0 {
            return Err(StockError::NegativeQuantity(quantity));
        }

        // Check the new total fits before touching the entries
        (self.total - self.get(location))
            .checked_add(quantity)
            .ok_or(StockError::Overflow)?;

        if quantity == 0 {
            self.entries.remove(location);
        } else {
            self.entries.insert(location.to_string(), quantity);
        }
        self.total = self.entries.values().sum();

        Ok(())
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for StockMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StockMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = BTreeMap::<String, i64>::deserialize(deserializer)?;
        StockMap::from_entries(entries).map_err(de::Error::custom)
    }
}

/// Working set of product stock maps touched by one operation.
///
/// Products must be loaded with [`StockBook::insert`] before they can be
/// moved. Products changed through the book are tracked as dirty so the
/// caller knows which rows to persist.
#[derive(Debug, Clone, Default)]
pub struct StockBook {
    maps: HashMap<Uuid, StockMap>,
    dirty: BTreeSet<Uuid>,
}

impl StockBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, product_id: Uuid, stock: StockMap) {
        self.maps.insert(product_id, stock);
    }

    pub fn contains(&self, product_id: Uuid) -> bool {
        self.maps.contains_key(&product_id)
    }

    pub fn stock(&self, product_id: Uuid) -> Option<&StockMap> {
        self.maps.get(&product_id)
    }

    /// Current quantity of a product at a location
    pub fn quantity(&self, product_id: Uuid, location_id: Uuid) -> Result<i64, StockError> {
        self.maps
            .get(&product_id)
            .map(|stock| stock.get(&location_id.to_string()))
            .ok_or(StockError::UnknownProduct(product_id))
    }

    /// Apply a signed delta at (product, location)
    pub fn apply(
        &mut self,
        product_id: Uuid,
        location_id: Uuid,
        delta: i64,
    ) -> Result<StockChange, StockError> {
        let stock = self
            .maps
            .get_mut(&product_id)
            .ok_or(StockError::UnknownProduct(product_id))?;

        let key = location_id.to_string();
        let change = apply_movement(stock.get(&key), delta)?;
        stock.set(&key, change.after)?;
        self.dirty.insert(product_id);

        Ok(change)
    }

    /// Set (product, location) to an absolute quantity, expressed as a delta
    pub fn set(
        &mut self,
        product_id: Uuid,
        location_id: Uuid,
        quantity: i64,
    ) -> Result<StockChange, StockError> {
        if quantity < 0 {
            return Err(StockError::NegativeQuantity(quantity));
        }
        let current = self.quantity(product_id, location_id)?;
        self.apply(product_id, location_id, quantity - current)
    }

    /// Products changed since the book was loaded, in id order
    pub fn dirty(&self) -> impl Iterator<Item = (Uuid, &StockMap)> {
        self.dirty
            .iter()
            .filter_map(|id| self.maps.get(id).map(|stock| (*id, stock)))
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_movement_increase() {
        let change = apply_movement(5, 10).unwrap();
        assert_eq!(change, StockChange { before: 5, after: 15, quantity: 10 });
    }

    #[test]
    fn test_apply_movement_rejects_overdraw() {
        let err = apply_movement(5, -8).unwrap_err();
        assert_eq!(
            err,
            StockError::InsufficientStock { available: 5, requested: 8 }
        );
    }

    #[test]
    fn test_apply_movement_to_exactly_zero() {
        let change = apply_movement(7, -7).unwrap();
        assert_eq!(change.after, 0);
    }

    #[test]
    fn test_apply_movement_overflow() {
        assert_eq!(apply_movement(i64::MAX, 1), Err(StockError::Overflow));
    }

    #[test]
    fn test_stock_map_default_zero() {
        let map = StockMap::new();
        assert_eq!(map.get("anywhere"), 0);
        assert_eq!(map.total(), 0);
    }

    #[test]
    fn test_stock_map_total_tracks_entries() {
        let mut map = StockMap::new();
        map.set("a", 4).unwrap();
        map.set("b", 6).unwrap();
        assert_eq!(map.total(), 10);

        map.set("a", 1).unwrap();
        assert_eq!(map.total(), 7);

        map.set("b", 0).unwrap();
        assert_eq!(map.total(), 1);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_stock_map_rejects_negative() {
        let mut map = StockMap::new();
        map.set("a", 3).unwrap();
        assert_eq!(map.set("a", -1), Err(StockError::NegativeQuantity(-1)));
        assert_eq!(map.get("a"), 3);
        assert_eq!(map.total(), 3);
    }

    #[test]
    fn test_stock_map_json_shape() {
        let map = StockMap::from_entries([("loc-1", 5), ("loc-2", 2)]).unwrap();
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json, serde_json::json!({ "loc-1": 5, "loc-2": 2 }));

        let back: StockMap = serde_json::from_value(json).unwrap();
        assert_eq!(back.total(), 7);
    }

    #[test]
    fn test_stock_map_deserialize_rejects_negative() {
        let result: Result<StockMap, _> = serde_json::from_value(serde_json::json!({ "x": -2 }));
        assert!(result.is_err());
    }

    #[test]
    fn test_book_marks_dirty_products() {
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let loc = Uuid::new_v4();

        let mut book = StockBook::new();
        book.insert(p1, StockMap::new());
        book.insert(p2, StockMap::new());

        book.apply(p1, loc, 3).unwrap();
        let dirty: Vec<Uuid> = book.dirty().map(|(id, _)| id).collect();
        assert_eq!(dirty, vec![p1]);
    }

    #[test]
    fn test_book_unknown_product() {
        let mut book = StockBook::new();
        let id = Uuid::new_v4();
        assert_eq!(
            book.apply(id, Uuid::new_v4(), 1),
            Err(StockError::UnknownProduct(id))
        );
    }

    #[test]
    fn test_book_set_is_delta() {
        let product = Uuid::new_v4();
        let loc = Uuid::new_v4();
        let mut book = StockBook::new();
        book.insert(
            product,
            StockMap::from_entries([(loc.to_string(), 20)]).unwrap(),
        );

        let change = book.set(product, loc, 17).unwrap();
        assert_eq!(change, StockChange { before: 20, after: 17, quantity: -3 });
        assert_eq!(book.stock(product).unwrap().total(), 17);
    }
}
