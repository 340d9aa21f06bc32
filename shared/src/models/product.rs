//! Product models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Quantity;

/// A sellable product with its current stock level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    /// Units currently on hand
    pub stock_quantity: Quantity,
    pub is_direct_sale: bool,
    pub is_manufactured: bool,
}

impl Product {
    pub fn flags(&self) -> ProductFlags {
        ProductFlags {
            is_direct_sale: self.is_direct_sale,
            is_manufactured: self.is_manufactured,
        }
    }
}

/// Product flags that drive the stock/production split
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFlags {
    /// Sold only from stock; never sent to production
    pub is_direct_sale: bool,
    /// Made in-house; shortfalls are backfilled by production
    pub is_manufactured: bool,
}
