//! CAN Acceptance Filter Planning
//!
//! The adapter passes an ID `x` iff `(x & mask) == (filter & mask)`.
//! Only 11-bit IDs are planned here.

use serde::{Deserialize, Serialize};

/// All eleven bits of a standard ID
pub const STANDARD_ID_MASK: u16 = 0x7FF;

/// An 11-bit filter/mask pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterMask {
    pub filter: u16,
    pub mask: u16,
}

impl FilterMask {
    /// Pass every ID
    pub const ACCEPT_ALL: FilterMask = FilterMask { filter: 0, mask: 0 };

    /// Build a pair, clearing filter bits the mask does not look at
    pub fn new(filter: u16, mask: u16) -> Self {
        let mask = mask & STANDARD_ID_MASK;
        Self {
            filter: filter & mask,
            mask,
        }
    }

    /// Pass exactly one ID
    pub fn exact(id: u16) -> Self {
        Self::new(id, STANDARD_ID_MASK)
    }

    /// Pass every ID whose set bits all lie inside `bits`
    pub fn within(bits: u16) -> Self {
        let bits = bits & STANDARD_ID_MASK;
        Self::new(bits, STANDARD_ID_MASK ^ bits)
    }

    /// Narrowest single pair passing every ID in `ids`
    pub fn whitelist(ids: &[u16]) -> Self {
        compute_whitelist(ids)
    }

    /// Whether the adapter would pass `id`
    pub fn accepts(&self, id: u16) -> bool {
        (id & self.mask) == (self.filter & self.mask)
    }
}

impl Default for FilterMask {
    fn default() -> Self {
        Self::ACCEPT_ALL
    }
}

/// Reduce a set of 11-bit IDs to one filter/mask pair.
///
/// A mask bit survives only if every ID agrees on it. The result passes
/// every listed ID but also any other ID sharing all surviving bits; it is
/// not a minimal-false-positive plan. An empty list passes everything.
pub fn compute_whitelist(ids: &[u16]) -> FilterMask {
    let Some((&first, rest)) = ids.split_first() else {
        return FilterMask::ACCEPT_ALL;
    };

    let mut mask = STANDARD_ID_MASK;
    for &id in rest {
        mask &= (first ^ id) ^ STANDARD_ID_MASK;
    }
    FilterMask::new(first, mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_whitelist_accepts_everything() {
        let plan = compute_whitelist(&[]);
        assert_eq!(plan, FilterMask { filter: 0, mask: 0 });
        assert!((0..=STANDARD_ID_MASK).all(|id| plan.accepts(id)));
    }

    #[test]
    fn test_single_id_is_exact() {
        assert_eq!(
            compute_whitelist(&[0x4DA]),
            FilterMask { filter: 0x4DA, mask: 0x7FF }
        );
    }

    #[test]
    fn test_divergent_low_bit() {
        let plan = compute_whitelist(&[0x4DA, 0x4DB]);
        assert_eq!(plan.mask, 0x7FE);
        assert_eq!(plan.filter, 0x4DA);
        assert!(plan.accepts(0x4DA));
        assert!(plan.accepts(0x4DB));
        assert!(!plan.accepts(0x4D8));
    }

    #[test]
    fn test_joystick_whitelist_lets_neighbours_through() {
        let ids = [0x4DA, 0x201, 0x205, 0x4EC, 0x433];
        let plan = compute_whitelist(&ids);
        assert!(ids.iter().all(|&id| plan.accepts(id)));
        assert_eq!(plan.filter & plan.mask, plan.filter);
        // 0x200 agrees with every surviving bit even though it is not listed
        assert!(plan.accepts(0x200));
    }

    #[test]
    fn test_exact_passes_one_id() {
        let plan = FilterMask::exact(0x433);
        assert_eq!(plan, FilterMask { filter: 0x433, mask: 0x7FF });
        assert!(plan.accepts(0x433));
        assert_eq!((0..=STANDARD_ID_MASK).filter(|&id| plan.accepts(id)).count(), 1);
    }

    #[test]
    fn test_whitelist_constructor_matches_planner() {
        let ids = [0x201, 0x205];
        assert_eq!(FilterMask::whitelist(&ids), compute_whitelist(&ids));
        assert_eq!(FilterMask::whitelist(&[]), FilterMask::default());
    }

    #[test]
    fn test_within() {
        let plan = FilterMask::within(0x00F);
        assert_eq!(plan, FilterMask { filter: 0, mask: 0x7F0 });
        assert!(plan.accepts(0x00A));
        assert!(!plan.accepts(0x010));
    }

    #[test]
    fn test_new_normalizes_filter() {
        let plan = FilterMask::new(0xFFFF, 0x0F0);
        assert_eq!(plan, FilterMask { filter: 0x0F0, mask: 0x0F0 });
    }

    proptest! {
        #[test]
        fn prop_whitelist_contains_every_member(
            ids in proptest::collection::btree_set(0u16..=STANDARD_ID_MASK, 1..32)
        ) {
            let ids: Vec<u16> = ids.into_iter().collect();
            let plan = compute_whitelist(&ids);
            prop_assert_eq!(plan.filter & plan.mask, plan.filter);
            for id in ids {
                prop_assert!(plan.accepts(id));
            }
        }
    }
}
