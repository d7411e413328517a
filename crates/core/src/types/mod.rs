//! Shared type definitions.

mod cart;
mod catalog;
mod id;
mod price;

pub use cart::{CartRecord, CartRecordError, CompactItem, LineItem, MAX_QUANTITY};
pub use catalog::CatalogRecord;
pub use id::{IdentityId, ItemId};
pub use price::{CurrencyCode, Price};
