//! Packaging job models and state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::allocation::Allocation;
use crate::types::{ParseStatusError, Quantity};

/// Work order to package a quantity of a product for an order/client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagingJob {
    pub id: Uuid,
    pub company_id: Uuid,
    pub product_id: Uuid,
    pub tracking_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub quantity_to_package: Quantity,
    pub quantity_packaged: Quantity,
    pub status: PackagingStatus,
    pub quality_check: bool,
    pub origin: PackagingOrigin,
    pub packaged_by: Option<Uuid>,
    pub packaged_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PackagingJob {
    /// Quantity credited to the line when this job is approved.
    /// A job approved without a reported count is credited in full.
    pub fn approved_quantity(&self) -> Quantity {
        if self.quantity_packaged > 0 {
            self.quantity_packaged
        } else {
            self.quantity_to_package
        }
    }
}

/// Fields needed to create a packaging job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPackagingJob {
    pub product_id: Uuid,
    pub tracking_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub quantity_to_package: Quantity,
    pub origin: PackagingOrigin,
}

/// Packaging job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackagingStatus {
    Pending,
    InProgress,
    Completed,
    Approved,
    Rejected,
}

impl PackagingStatus {
    pub const ALL: [PackagingStatus; 5] = [
        PackagingStatus::Pending,
        PackagingStatus::InProgress,
        PackagingStatus::Completed,
        PackagingStatus::Approved,
        PackagingStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PackagingStatus::Pending => "pending",
            PackagingStatus::InProgress => "in_progress",
            PackagingStatus::Completed => "completed",
            PackagingStatus::Approved => "approved",
            PackagingStatus::Rejected => "rejected",
        }
    }

    /// Allowed moves of the packaging state machine. Approval is terminal;
    /// a rejected job can be picked up again for re-work.
    pub fn can_transition_to(&self, next: PackagingStatus) -> bool {
        use PackagingStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Rejected)
                | (InProgress, Completed)
                | (InProgress, Approved)
                | (InProgress, Rejected)
                | (Completed, Approved)
                | (Completed, Rejected)
                | (Rejected, InProgress)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PackagingStatus::Approved)
    }
}

impl std::fmt::Display for PackagingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PackagingStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError::new("packaging", s))
    }
}

/// Where the goods being packaged came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackagingOrigin {
    Stock,
    Production,
    /// Stock portion of a line that is also partly produced
    Mixed,
}

impl PackagingOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackagingOrigin::Stock => "stock",
            PackagingOrigin::Production => "production",
            PackagingOrigin::Mixed => "mixed",
        }
    }

    /// Origin of the stock packaging job created at allocation time
    pub fn for_allocation(allocation: &Allocation) -> Self {
        if allocation.production_qty > 0 {
            PackagingOrigin::Mixed
        } else {
            PackagingOrigin::Stock
        }
    }
}

impl std::fmt::Display for PackagingOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PackagingOrigin {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stock" => Ok(PackagingOrigin::Stock),
            "production" => Ok(PackagingOrigin::Production),
            "mixed" => Ok(PackagingOrigin::Mixed),
            other => Err(ParseStatusError::new("packaging origin", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        use PackagingStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Approved));
        assert!(InProgress.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Approved));
    }

    #[test]
    fn test_approved_is_terminal() {
        for next in PackagingStatus::ALL {
            assert!(!PackagingStatus::Approved.can_transition_to(next));
        }
        assert!(PackagingStatus::Approved.is_terminal());
    }

    #[test]
    fn test_cannot_skip_packing() {
        assert!(!PackagingStatus::Pending.can_transition_to(PackagingStatus::Approved));
        assert!(!PackagingStatus::Pending.can_transition_to(PackagingStatus::Completed));
    }

    #[test]
    fn test_rejected_can_be_reworked() {
        assert!(PackagingStatus::Rejected.can_transition_to(PackagingStatus::InProgress));
        assert!(!PackagingStatus::Rejected.can_transition_to(PackagingStatus::Approved));
    }

    #[test]
    fn test_origin_for_allocation() {
        let stock_only = Allocation {
            stock_qty: 5,
            production_qty: 0,
            unallocated_qty: 0,
        };
        let mixed = Allocation {
            stock_qty: 3,
            production_qty: 7,
            unallocated_qty: 0,
        };
        assert_eq!(PackagingOrigin::for_allocation(&stock_only), PackagingOrigin::Stock);
        assert_eq!(PackagingOrigin::for_allocation(&mixed), PackagingOrigin::Mixed);
    }
}
