//! Conversion between in-memory line items and their durable compact form.
//!
//! Pure functions. The asymmetry is deliberate: hydration silently drops
//! ids missing from the catalog index (discontinued items), because a stale
//! durable record must never block cart loading.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use sundry_core::{CatalogRecord, CompactItem, ItemId, LineItem};

/// Clamp a nonzero quantity into `1..=max_quantity`.
#[must_use]
pub fn clamp_quantity(quantity: u32, max_quantity: u32) -> u32 {
    quantity.clamp(1, max_quantity)
}

/// Compact line items for persistence: duplicate ids are quantity-summed,
/// zero quantities dropped, results clamped.
///
/// Line items carry their own catalog snapshot, so every entry is
/// resolvable by construction; first-seen order is preserved.
#[must_use]
pub fn to_compact(items: &[LineItem], max_quantity: u32) -> Vec<CompactItem> {
    let mut order: Vec<ItemId> = Vec::new();
    let mut quantities: HashMap<ItemId, u32> = HashMap::new();

    for item in items {
        if item.quantity == 0 {
            continue;
        }
        match quantities.entry(item.item_id().clone()) {
            Entry::Occupied(mut entry) => {
                *entry.get_mut() = entry.get().saturating_add(item.quantity);
            }
            Entry::Vacant(entry) => {
                order.push(item.item_id().clone());
                entry.insert(item.quantity);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| {
            let quantity = quantities.remove(&id)?;
            Some(CompactItem {
                quantity: clamp_quantity(quantity, max_quantity),
                id,
            })
        })
        .collect()
}

/// Hydrate compact items into displayable line items against a catalog
/// index.
///
/// Ids absent from the index are dropped without error; duplicate ids are
/// quantity-summed; zero quantities dropped; results clamped.
#[must_use]
pub fn from_compact(
    items: &[CompactItem],
    index: &HashMap<ItemId, CatalogRecord>,
    max_quantity: u32,
) -> Vec<LineItem> {
    let mut out: Vec<LineItem> = Vec::new();
    let mut positions: HashMap<ItemId, usize> = HashMap::new();

    for item in items {
        if item.quantity == 0 {
            continue;
        }
        let Some(record) = index.get(&item.id) else {
            tracing::debug!(item = %item.id, "dropping unknown item during hydration");
            continue;
        };
        if let Some(&position) = positions.get(&item.id) {
            if let Some(existing) = out.get_mut(position) {
                existing.quantity = clamp_quantity(
                    existing.quantity.saturating_add(item.quantity),
                    max_quantity,
                );
            }
        } else {
            positions.insert(item.id.clone(), out.len());
            out.push(LineItem::new(
                record.clone(),
                clamp_quantity(item.quantity, max_quantity),
            ));
        }
    }

    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use rust_decimal::dec;
    use sundry_core::{CurrencyCode, MAX_QUANTITY, Price};

    fn catalog(ids: &[&str]) -> HashMap<ItemId, CatalogRecord> {
        ids.iter()
            .map(|id| {
                (
                    ItemId::new(*id),
                    CatalogRecord {
                        id: ItemId::new(*id),
                        name: format!("Item {id}"),
                        price: Price::new(dec!(2.00), CurrencyCode::USD),
                        image_url: None,
                    },
                )
            })
            .collect()
    }

    fn compact(items: &[(&str, u32)]) -> Vec<CompactItem> {
        items
            .iter()
            .map(|(id, qty)| CompactItem::new(*id, *qty))
            .collect()
    }

    #[test]
    fn test_to_compact_sums_duplicates() {
        let index = catalog(&["a"]);
        let mut items = from_compact(&compact(&[("a", 2)]), &index, MAX_QUANTITY);
        items.extend(from_compact(&compact(&[("a", 3)]), &index, MAX_QUANTITY));

        let result = to_compact(&items, MAX_QUANTITY);
        assert_eq!(result, compact(&[("a", 5)]));
    }

    #[test]
    fn test_from_compact_drops_unknown_ids() {
        let index = catalog(&["a"]);
        let items = from_compact(&compact(&[("a", 1), ("gone", 4)]), &index, MAX_QUANTITY);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_id(), &ItemId::new("a"));
    }

    #[test]
    fn test_from_compact_drops_zero_quantity() {
        let index = catalog(&["a"]);
        let items = from_compact(&compact(&[("a", 0)]), &index, MAX_QUANTITY);
        assert!(items.is_empty());
    }

    #[test]
    fn test_clamping_on_both_directions() {
        let index = catalog(&["a"]);
        let items = from_compact(&compact(&[("a", 500)]), &index, MAX_QUANTITY);
        assert_eq!(items[0].quantity, MAX_QUANTITY);

        let result = to_compact(&items, MAX_QUANTITY);
        assert_eq!(result[0].quantity, MAX_QUANTITY);
    }

    #[test]
    fn test_round_trip_idempotence() {
        // toCompact . fromCompact . toCompact == toCompact, given a stable index
        let index = catalog(&["a", "b"]);
        let original = compact(&[("a", 2), ("b", 7)]);

        let hydrated = from_compact(&original, &index, MAX_QUANTITY);
        let once = to_compact(&hydrated, MAX_QUANTITY);
        let twice = to_compact(&from_compact(&once, &index, MAX_QUANTITY), MAX_QUANTITY);

        assert_eq!(once, original);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_preserves_first_seen_order() {
        let index = catalog(&["a", "b", "c"]);
        let items = from_compact(
            &compact(&[("c", 1), ("a", 1), ("c", 2), ("b", 1)]),
            &index,
            MAX_QUANTITY,
        );
        let ids: Vec<_> = items.iter().map(|i| i.item_id().as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
        assert_eq!(items[0].quantity, 3);
    }
}
