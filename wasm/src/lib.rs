//! WebAssembly module for the ERP fulfillment UI
//!
//! Provides client-side previews of the server's fulfillment rules:
//! - Stock/production split for an order line
//! - Order status derived from line statuses
//! - Receivable due dates from payment terms

use chrono::NaiveDate;
use wasm_bindgen::prelude::*;

pub use shared::allocation::*;
pub use shared::models::*;
pub use shared::types::*;

/// Preview how `required` units of a product would be allocated.
///
/// Returns the allocation as JSON:
/// `{"stock_qty": .., "production_qty": .., "unallocated_qty": ..}`.
#[wasm_bindgen]
pub fn preview_allocation(
    is_direct_sale: bool,
    is_manufactured: bool,
    required: i32,
    on_hand: i32,
) -> Result<String, JsValue> {
    let flags = ProductFlags {
        is_direct_sale,
        is_manufactured,
    };
    let allocation = compute_allocation(flags, Quantity::from(required), Quantity::from(on_hand));
    serde_json::to_string(&allocation).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Derive an order status from a JSON array of line statuses
/// (e.g. `["in_packaging", "ready_for_sale"]`).
#[wasm_bindgen]
pub fn preview_order_status(statuses_json: &str) -> Result<String, JsValue> {
    let statuses: Vec<TrackingStatus> = serde_json::from_str(statuses_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid statuses JSON: {}", e)))?;
    Ok(derive_order_status(statuses).to_string())
}

/// Due date (`YYYY-MM-DD`) of a receivable issued on `issued_on` with the
/// given free-text payment term.
#[wasm_bindgen]
pub fn preview_due_date(payment_term: Option<String>, issued_on: &str) -> Result<String, JsValue> {
    let issued_on = NaiveDate::parse_from_str(issued_on, "%Y-%m-%d")
        .map_err(|e| JsValue::from_str(&format!("Invalid date: {}", e)))?;
    Ok(due_date_for(payment_term.as_deref(), issued_on).to_string())
}

/// Due date of a receivable issued today, by the browser's clock.
#[wasm_bindgen]
pub fn preview_due_date_today(payment_term: Option<String>) -> Result<String, JsValue> {
    let now = js_sys::Date::new_0();
    let today = NaiveDate::from_ymd_opt(
        now.get_full_year() as i32,
        now.get_month() + 1,
        now.get_date(),
    )
    .ok_or_else(|| JsValue::from_str("Invalid browser date"))?;
    Ok(due_date_for(payment_term.as_deref(), today).to_string())
}

fn due_date_for(payment_term: Option<&str>, issued_on: NaiveDate) -> NaiveDate {
    let term = PaymentTerm::parse_free_text(payment_term).unwrap_or_else(|| {
        #[cfg(target_arch = "wasm32")]
        web_sys::console::warn_1(&JsValue::from_str("Payment term unreadable, using default"));
        PaymentTerm::default()
    });
    term.due_date(issued_on)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_manufactured_allocation() {
        let json = preview_allocation(false, true, 10, 3).unwrap();
        let allocation: Allocation = serde_json::from_str(&json).unwrap();
        assert_eq!(allocation.stock_qty, 3);
        assert_eq!(allocation.production_qty, 7);
    }

    #[test]
    fn test_preview_order_status() {
        assert_eq!(
            preview_order_status(r#"["in_production", "in_packaging"]"#).unwrap(),
            "in_production"
        );
        assert_eq!(
            preview_order_status(r#"["ready_for_sale", "ready_for_sale"]"#).unwrap(),
            "released_for_sale"
        );
    }

    #[test]
    fn test_due_date_with_and_without_term() {
        let issued = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();
        assert_eq!(
            due_date_for(Some("45 dias"), issued),
            NaiveDate::from_ymd_opt(2026, 3, 6).unwrap()
        );
        assert_eq!(
            due_date_for(None, issued),
            NaiveDate::from_ymd_opt(2026, 2, 19).unwrap()
        );
    }
}
