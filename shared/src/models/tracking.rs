//! Per-line fulfillment tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::allocation::Allocation;
use crate::types::{ParseStatusError, Quantity};

/// How one order line is being fulfilled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemTracking {
    pub id: Uuid,
    pub company_id: Uuid,
    pub order_item_id: Uuid,
    pub quantity_target: Quantity,
    pub quantity_from_stock: Quantity,
    pub quantity_from_production: Quantity,
    pub quantity_packaged_approved: Quantity,
    pub status: TrackingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderItemTracking {
    /// The stock/production split recorded on this line
    pub fn allocation(&self) -> Allocation {
        Allocation {
            stock_qty: self.quantity_from_stock,
            production_qty: self.quantity_from_production,
            unallocated_qty: 0,
        }
    }

    /// Apply the total approved packaging quantity of this line, returning
    /// the new approved total and status. The total is capped at the target
    /// and never decreases.
    pub fn with_approved_total(&self, approved_total: Quantity) -> (Quantity, TrackingStatus) {
        let total = approved_total
            .max(0)
            .min(self.quantity_target)
            .max(self.quantity_packaged_approved);
        let status = if total >= self.quantity_target {
            TrackingStatus::ReadyForSale
        } else {
            TrackingStatus::PartiallyReady
        };
        (total, status.max_with(self.status))
    }
}

/// Fields needed to create a tracking record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTracking {
    pub order_item_id: Uuid,
    pub quantity_target: Quantity,
    pub quantity_from_stock: Quantity,
    pub quantity_from_production: Quantity,
    pub status: TrackingStatus,
}

impl NewTracking {
    pub fn from_allocation(order_item_id: Uuid, allocation: &Allocation) -> Self {
        Self {
            order_item_id,
            quantity_target: allocation.target(),
            quantity_from_stock: allocation.stock_qty,
            quantity_from_production: allocation.production_qty,
            status: TrackingStatus::initial_for(allocation),
        }
    }
}

/// Status of a tracking record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Pending,
    InProduction,
    InPackaging,
    PartiallyReady,
    ReadyForSale,
}

impl TrackingStatus {
    pub const ALL: [TrackingStatus; 5] = [
        TrackingStatus::Pending,
        TrackingStatus::InProduction,
        TrackingStatus::InPackaging,
        TrackingStatus::PartiallyReady,
        TrackingStatus::ReadyForSale,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingStatus::Pending => "pending",
            TrackingStatus::InProduction => "in_production",
            TrackingStatus::InPackaging => "in_packaging",
            TrackingStatus::PartiallyReady => "partially_ready",
            TrackingStatus::ReadyForSale => "ready_for_sale",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            TrackingStatus::Pending => 0,
            TrackingStatus::InProduction => 1,
            TrackingStatus::InPackaging => 2,
            TrackingStatus::PartiallyReady => 3,
            TrackingStatus::ReadyForSale => 4,
        }
    }

    /// Statuses strictly before `self`, used to build forward-only updates
    pub fn predecessors(&self) -> Vec<TrackingStatus> {
        Self::ALL
            .iter()
            .copied()
            .filter(|s| s.rank() < self.rank())
            .collect()
    }

    /// The later of two statuses; tracking never moves backwards
    pub fn max_with(self, other: TrackingStatus) -> TrackingStatus {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    /// Status a freshly allocated line starts in
    pub fn initial_for(allocation: &Allocation) -> Self {
        if allocation.production_qty > 0 {
            TrackingStatus::InProduction
        } else if allocation.stock_qty > 0 {
            TrackingStatus::InPackaging
        } else {
            TrackingStatus::Pending
        }
    }
}

impl std::fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrackingStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError::new("tracking", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracking(target: Quantity, approved: Quantity, status: TrackingStatus) -> OrderItemTracking {
        OrderItemTracking {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            order_item_id: Uuid::new_v4(),
            quantity_target: target,
            quantity_from_stock: target,
            quantity_from_production: 0,
            quantity_packaged_approved: approved,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_approval_is_ready() {
        let t = tracking(10, 0, TrackingStatus::InPackaging);
        assert_eq!(t.with_approved_total(10), (10, TrackingStatus::ReadyForSale));
    }

    #[test]
    fn test_partial_approval() {
        let t = tracking(10, 0, TrackingStatus::InProduction);
        assert_eq!(t.with_approved_total(4), (4, TrackingStatus::PartiallyReady));
    }

    #[test]
    fn test_approval_total_is_capped() {
        let t = tracking(10, 6, TrackingStatus::PartiallyReady);
        assert_eq!(t.with_approved_total(14), (10, TrackingStatus::ReadyForSale));
    }

    #[test]
    fn test_approval_total_never_decreases() {
        let t = tracking(10, 6, TrackingStatus::PartiallyReady);
        assert_eq!(t.with_approved_total(4), (6, TrackingStatus::PartiallyReady));

        let ready = tracking(10, 10, TrackingStatus::ReadyForSale);
        assert_eq!(ready.with_approved_total(0).1, TrackingStatus::ReadyForSale);
    }

    #[test]
    fn test_initial_status_from_allocation() {
        let mixed = Allocation {
            stock_qty: 3,
            production_qty: 7,
            unallocated_qty: 0,
        };
        assert_eq!(TrackingStatus::initial_for(&mixed), TrackingStatus::InProduction);

        let stock_only = Allocation {
            stock_qty: 3,
            production_qty: 0,
            unallocated_qty: 0,
        };
        assert_eq!(TrackingStatus::initial_for(&stock_only), TrackingStatus::InPackaging);

        assert_eq!(
            TrackingStatus::initial_for(&Allocation::default()),
            TrackingStatus::Pending
        );
    }
}
