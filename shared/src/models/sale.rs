//! Sale models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ParseStatusError;

/// A sale raised from an order released for sale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub company_id: Uuid,
    pub order_id: Option<Uuid>,
    /// Display number (e.g., "VND-2026-00042")
    pub sale_number: String,
    pub client_id: Option<Uuid>,
    pub client_name: String,
    pub total_amount: Decimal,
    pub payment_method: Option<String>,
    pub payment_term: Option<String>,
    pub status: SaleStatus,
    pub confirmed_by: Option<Uuid>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a sale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    pub order_id: Option<Uuid>,
    pub sale_number: String,
    pub client_id: Option<Uuid>,
    pub client_name: String,
    pub total_amount: Decimal,
    pub payment_method: Option<String>,
    pub payment_term: Option<String>,
    pub created_by: Option<Uuid>,
}

/// Sale status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Confirmed => "confirmed",
            SaleStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SaleStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SaleStatus::Pending),
            "confirmed" => Ok(SaleStatus::Confirmed),
            "cancelled" => Ok(SaleStatus::Cancelled),
            other => Err(ParseStatusError::new("sale", other)),
        }
    }
}

/// Generate a sale number
pub fn generate_sale_number(year: i32, sequence: i64) -> String {
    format!("VND-{}-{:05}", year, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_number_format() {
        assert_eq!(generate_sale_number(2026, 42), "VND-2026-00042");
        assert_eq!(generate_sale_number(2026, 123456), "VND-2026-123456");
    }
}
