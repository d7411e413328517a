//! One-shot reconciliation of guest and remote cart replicas at login.
//!
//! The remote list seeds the result because it is the authoritative state
//! and may include server-side corrections. Guest quantities are *added*
//! to matching entries rather than replacing them: a guest who added two
//! more units of an item already in their signed-in cart ends up with the
//! sum. The caller guards this against re-running within a session.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use sundry_core::{CompactItem, ItemId};

use crate::codec::clamp_quantity;

/// Reconcile a guest (local) compact list with the authoritative remote
/// list, quantity-summing matches and clamping every result.
///
/// Remote entries keep their order; local-only entries follow in their own
/// order.
#[must_use]
pub fn merge(
    local: &[CompactItem],
    remote: &[CompactItem],
    max_quantity: u32,
) -> Vec<CompactItem> {
    let mut order: Vec<ItemId> = Vec::new();
    let mut quantities: HashMap<ItemId, u32> = HashMap::new();

    for item in remote.iter().chain(local) {
        if item.quantity == 0 {
            continue;
        }
        match quantities.entry(item.id.clone()) {
            Entry::Occupied(mut entry) => {
                *entry.get_mut() = entry.get().saturating_add(item.quantity);
            }
            Entry::Vacant(entry) => {
                order.push(item.id.clone());
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use sundry_core::MAX_QUANTITY;

    fn compact(items: &[(&str, u32)]) -> Vec<CompactItem> {
        items
            .iter()
            .map(|(id, qty)| CompactItem::new(*id, *qty))
            .collect()
    }

    fn as_set(items: &[CompactItem]) -> HashSet<(String, u32)> {
        items
            .iter()
            .map(|i| (i.id.as_str().to_string(), i.quantity))
            .collect()
    }

    #[test]
    fn test_matching_entries_sum_quantities() {
        let merged = merge(&compact(&[("a", 2)]), &compact(&[("a", 3)]), MAX_QUANTITY);
        assert_eq!(merged, compact(&[("a", 5)]));
    }

    #[test]
    fn test_disjoint_entries_union() {
        let merged = merge(
            &compact(&[("a", 2), ("b", 1)]),
            &compact(&[("b", 4)]),
            MAX_QUANTITY,
        );
        assert_eq!(as_set(&merged), as_set(&compact(&[("a", 2), ("b", 5)])));
    }

    #[test]
    fn test_quantity_commutes() {
        let left = merge(&compact(&[("a", 2)]), &compact(&[("a", 3)]), MAX_QUANTITY);
        let right = merge(&compact(&[("a", 3)]), &compact(&[("a", 2)]), MAX_QUANTITY);
        assert_eq!(as_set(&left), as_set(&right));
    }

    #[test]
    fn test_remote_entries_lead_the_order() {
        let merged = merge(
            &compact(&[("local-only", 1), ("shared", 1)]),
            &compact(&[("remote-only", 1), ("shared", 1)]),
            MAX_QUANTITY,
        );
        let ids: Vec<_> = merged.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["remote-only", "shared", "local-only"]);
    }

    #[test]
    fn test_sum_is_clamped() {
        let merged = merge(
            &compact(&[("a", 80)]),
            &compact(&[("a", 60)]),
            MAX_QUANTITY,
        );
        assert_eq!(merged, compact(&[("a", MAX_QUANTITY)]));
    }

    #[test]
    fn test_zero_quantities_mean_removal() {
        let merged = merge(&compact(&[("a", 0)]), &compact(&[("b", 0)]), MAX_QUANTITY);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_empty_sides() {
        assert_eq!(
            merge(&[], &compact(&[("a", 1)]), MAX_QUANTITY),
            compact(&[("a", 1)])
        );
        assert_eq!(
            merge(&compact(&[("a", 1)]), &[], MAX_QUANTITY),
            compact(&[("a", 1)])
        );
        assert!(merge(&[], &[], MAX_QUANTITY).is_empty());
    }
}
