//! Cart item and durable wire types.
//!
//! [`CompactItem`] and [`CartRecord`] are the only shapes ever persisted,
//! identical for the local store and the remote cart API. [`LineItem`] is
//! the in-memory form, a compact item hydrated with catalog display data.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::catalog::CatalogRecord;
use super::id::ItemId;
use super::price::Price;

/// Upper bound for any persisted quantity.
///
/// The cart API rejects quantities outside `[1, MAX_QUANTITY]`, so clients
/// clamp before sending.
pub const MAX_QUANTITY: u32 = 100;

/// The minimal durable `(item, quantity)` pair.
///
/// Wire shape: `{"id": "...", "quantity": n}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactItem {
    /// Catalog item identifier.
    pub id: ItemId,
    /// Units of the item, `1..=MAX_QUANTITY` once persisted.
    pub quantity: u32,
}

impl CompactItem {
    /// Create a new compact item.
    #[must_use]
    pub fn new(id: impl Into<ItemId>, quantity: u32) -> Self {
        Self {
            id: id.into(),
            quantity,
        }
    }
}

/// The durable cart record, shared by both storage backends.
///
/// Wire shape: `{"items": [{"id": "...", "quantity": n}]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartRecord {
    /// Compact items; no two entries share an id.
    pub items: Vec<CompactItem>,
}

impl CartRecord {
    /// Create a record from compact items.
    #[must_use]
    pub fn new(items: Vec<CompactItem>) -> Self {
        Self { items }
    }

    /// Check the record invariants: quantities within `1..=MAX_QUANTITY`
    /// and no duplicate item ids.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), CartRecordError> {
        let mut seen = HashSet::new();
        for item in &self.items {
            if item.quantity < 1 || item.quantity > MAX_QUANTITY {
                return Err(CartRecordError::QuantityOutOfRange {
                    id: item.id.clone(),
                    quantity: item.quantity,
                });
            }
            if !seen.insert(&item.id) {
                return Err(CartRecordError::DuplicateItem(item.id.clone()));
            }
        }
        Ok(())
    }
}

/// Violation of the durable cart record invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartRecordError {
    /// A quantity fell outside the accepted range.
    #[error("quantity {quantity} for item {id} is outside 1..={MAX_QUANTITY}")]
    QuantityOutOfRange {
        /// Offending item.
        id: ItemId,
        /// Rejected quantity.
        quantity: u32,
    },

    /// Two entries share an item id.
    #[error("duplicate item {0} in cart record")]
    DuplicateItem(ItemId),
}

/// An in-memory cart line: a compact item hydrated with catalog data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    /// Units of the item, always at least 1.
    pub quantity: u32,
    /// Denormalized catalog snapshot for display; possibly stale, never
    /// authoritative pricing.
    pub catalog: CatalogRecord,
}

impl LineItem {
    /// Create a line item from a catalog record and quantity.
    #[must_use]
    pub const fn new(catalog: CatalogRecord, quantity: u32) -> Self {
        Self { quantity, catalog }
    }

    /// The item identifier this line refers to.
    #[must_use]
    pub const fn item_id(&self) -> &ItemId {
        &self.catalog.id
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.catalog.price.times(self.quantity)
    }
}
