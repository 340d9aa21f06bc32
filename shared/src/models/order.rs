//! Order models and the order status projection

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::TrackingStatus;
use crate::types::{ParseStatusError, Quantity};

/// A customer order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub company_id: Uuid,
    /// Display number shown to users (e.g., "PED-000123")
    pub order_number: String,
    pub client_id: Option<Uuid>,
    pub client_name: String,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub payment_method: Option<String>,
    /// Free-text payment term as typed at order placement (e.g., "30 dias")
    pub payment_term: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Quantity,
    pub unit_price: Decimal,
}

/// Aggregate order status, in fulfillment order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    InProduction,
    InPackaging,
    ReleasedForSale,
    SaleConfirmed,
    InDelivery,
    Delivered,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::InProduction,
        OrderStatus::InPackaging,
        OrderStatus::ReleasedForSale,
        OrderStatus::SaleConfirmed,
        OrderStatus::InDelivery,
        OrderStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InProduction => "in_production",
            OrderStatus::InPackaging => "in_packaging",
            OrderStatus::ReleasedForSale => "released_for_sale",
            OrderStatus::SaleConfirmed => "sale_confirmed",
            OrderStatus::InDelivery => "in_delivery",
            OrderStatus::Delivered => "delivered",
        }
    }

    /// Position in the fulfillment sequence
    pub fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::InProduction => 1,
            OrderStatus::InPackaging => 2,
            OrderStatus::ReleasedForSale => 3,
            OrderStatus::SaleConfirmed => 4,
            OrderStatus::InDelivery => 5,
            OrderStatus::Delivered => 6,
        }
    }

    /// Whether moving from `self` to `next` keeps the status monotonic.
    /// Re-asserting the current status is not an advance.
    pub fn can_advance_to(&self, next: OrderStatus) -> bool {
        next.rank() > self.rank()
    }

    /// Statuses strictly before `self`, used to build forward-only updates
    pub fn predecessors(&self) -> Vec<OrderStatus> {
        Self::ALL
            .iter()
            .copied()
            .filter(|s| s.rank() < self.rank())
            .collect()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError::new("order", s))
    }
}

/// Project the statuses of an order's tracking records onto the order.
///
/// Every call site that moves an order forward goes through this function:
/// production outranks packaging, and the order is released only when every
/// line is ready for sale.
pub fn derive_order_status<I>(item_statuses: I) -> OrderStatus
where
    I: IntoIterator<Item = TrackingStatus>,
{
    let mut any = false;
    let mut all_ready = true;
    let mut any_production = false;
    let mut any_packaging = false;

    for status in item_statuses {
        any = true;
        match status {
            TrackingStatus::Pending => all_ready = false,
            TrackingStatus::InProduction => {
                all_ready = false;
                any_production = true;
            }
            TrackingStatus::InPackaging | TrackingStatus::PartiallyReady => {
                all_ready = false;
                any_packaging = true;
            }
            TrackingStatus::ReadyForSale => any_packaging = true,
        }
    }

    if !any {
        OrderStatus::Pending
    } else if all_ready {
        OrderStatus::ReleasedForSale
    } else if any_production {
        OrderStatus::InProduction
    } else if any_packaging {
        OrderStatus::InPackaging
    } else {
        OrderStatus::Pending
    }
}
