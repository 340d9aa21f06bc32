//! Stock/production split for order lines

use serde::{Deserialize, Serialize};

use crate::models::ProductFlags;
use crate::types::Quantity;

/// How a line's required quantity is covered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Units served from on-hand stock
    pub stock_qty: Quantity,
    /// Units sent to production
    pub production_qty: Quantity,
    /// Demand neither stock nor production will cover
    pub unallocated_qty: Quantity,
}

impl Allocation {
    /// Quantity the line is tracked against
    pub fn target(&self) -> Quantity {
        self.stock_qty + self.production_qty
    }

    pub fn needs_production(&self) -> bool {
        self.production_qty > 0
    }

    pub fn needs_packaging(&self) -> bool {
        self.stock_qty > 0
    }
}

/// Split `required` units of a product between stock and production.
///
/// Direct-sale and plain stocked products are capped at what is on hand and
/// the excess is reported as `unallocated_qty`, not backordered. Manufactured
/// products send the shortfall to production.
pub fn compute_allocation(flags: ProductFlags, required: Quantity, on_hand: Quantity) -> Allocation {
    let required = required.max(0);
    let on_hand = on_hand.max(0);
    let stock_qty = required.min(on_hand);

    let production_qty = if flags.is_direct_sale {
        0
    } else if flags.is_manufactured {
        (required - on_hand).max(0)
    } else {
        0
    };

    Allocation {
        stock_qty,
        production_qty,
        unallocated_qty: required - stock_qty - production_qty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DIRECT: ProductFlags = ProductFlags {
        is_direct_sale: true,
        is_manufactured: false,
    };
    const MANUFACTURED: ProductFlags = ProductFlags {
        is_direct_sale: false,
        is_manufactured: true,
    };
    const STOCKED: ProductFlags = ProductFlags {
        is_direct_sale: false,
        is_manufactured: false,
    };

    #[test]
    fn test_direct_sale_caps_at_stock() {
        let a = compute_allocation(DIRECT, 10, 5);
        assert_eq!(a.stock_qty, 5);
        assert_eq!(a.production_qty, 0);
        assert_eq!(a.unallocated_qty, 5);
    }

    #[test]
    fn test_manufactured_backfills_from_production() {
        let a = compute_allocation(MANUFACTURED, 10, 3);
        assert_eq!(a.stock_qty, 3);
        assert_eq!(a.production_qty, 7);
        assert_eq!(a.unallocated_qty, 0);
        assert_eq!(a.target(), 10);
    }

    #[test]
    fn test_direct_sale_wins_over_manufactured() {
        let flags = ProductFlags {
            is_direct_sale: true,
            is_manufactured: true,
        };
        let a = compute_allocation(flags, 10, 4);
        assert_eq!((a.stock_qty, a.production_qty), (4, 0));
    }

    #[test]
    fn test_plain_stock_product() {
        let a = compute_allocation(STOCKED, 8, 20);
        assert_eq!((a.stock_qty, a.production_qty, a.unallocated_qty), (8, 0, 0));
    }

    #[test]
    fn test_negative_stock_is_treated_as_empty() {
        let a = compute_allocation(MANUFACTURED, 6, -4);
        assert_eq!((a.stock_qty, a.production_qty), (0, 6));
    }

    #[test]
    fn test_manufactured_with_no_stock_needs_no_packaging_yet() {
        let a = compute_allocation(MANUFACTURED, 5, 0);
        assert!(a.needs_production());
        assert!(!a.needs_packaging());
    }

    fn flags_strategy() -> impl Strategy<Value = ProductFlags> {
        (any::<bool>(), any::<bool>()).prop_map(|(is_direct_sale, is_manufactured)| ProductFlags {
            is_direct_sale,
            is_manufactured,
        })
    }

    proptest! {
        #[test]
        fn prop_split_accounts_for_all_demand(
            flags in flags_strategy(),
            required in 0i64..10_000,
            on_hand in -100i64..10_000,
        ) {
            let a = compute_allocation(flags, required, on_hand);
            prop_assert_eq!(a.stock_qty + a.production_qty + a.unallocated_qty, required);
            prop_assert!(a.stock_qty <= required.min(on_hand.max(0)));
            prop_assert!(a.stock_qty >= 0 && a.production_qty >= 0 && a.unallocated_qty >= 0);
        }

        #[test]
        fn prop_only_manufactured_goes_to_production(
            flags in flags_strategy(),
            required in 0i64..10_000,
            on_hand in 0i64..10_000,
        ) {
            let a = compute_allocation(flags, required, on_hand);
            if flags.is_direct_sale || !flags.is_manufactured {
                prop_assert_eq!(a.production_qty, 0);
            } else {
                prop_assert_eq!(a.unallocated_qty, 0);
            }
        }
    }
}
