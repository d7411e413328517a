//! Catalog record types.

use serde::{Deserialize, Serialize};

use super::id::ItemId;
use super::price::Price;

/// A catalog entry for a sellable item.
///
/// Copies of this record attached to cart line items are denormalized
/// display data and may be stale; the catalog service is the source of
/// truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Item identifier, unique within the catalog.
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Unit price snapshot.
    pub price: Price,
    /// Primary image URL, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}
