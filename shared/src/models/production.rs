//! Production job models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ParseStatusError, Quantity};

/// Work order to manufacture a quantity of a product for one order line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionJob {
    pub id: Uuid,
    pub company_id: Uuid,
    pub product_id: Uuid,
    pub tracking_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub quantity_requested: Quantity,
    pub quantity_produced: Quantity,
    pub status: ProductionStatus,
    pub started_by: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a production job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProductionJob {
    pub product_id: Uuid,
    pub tracking_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub quantity_requested: Quantity,
}

/// Production job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl ProductionStatus {
    pub const ALL: [ProductionStatus; 4] = [
        ProductionStatus::Pending,
        ProductionStatus::InProgress,
        ProductionStatus::Completed,
        ProductionStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionStatus::Pending => "pending",
            ProductionStatus::InProgress => "in_progress",
            ProductionStatus::Completed => "completed",
            ProductionStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: ProductionStatus) -> bool {
        use ProductionStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Completed)
                | (InProgress, Completed)
                | (Pending, Cancelled)
                | (InProgress, Cancelled)
        )
    }
}

impl std::fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError::new("production", s))
    }
}
