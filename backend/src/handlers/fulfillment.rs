//! HTTP handlers for order allocation and tracking

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::allocation::{AllocateInput, AllocationService, OrderAllocationResult};
use crate::AppState;
use shared::OrderItemTracking;

/// Allocate one order, or every pending order when no id is given
pub async fn allocate_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    input: Option<Json<AllocateInput>>,
) -> AppResult<Json<Vec<OrderAllocationResult>>> {
    current_user.0.require("fulfillment", "allocate")?;

    let input = input.map(|Json(input)| input).unwrap_or_default();
    let service = AllocationService::new(state.store, &state.config.fulfillment);
    let results = service
        .allocate(current_user.0.company_id, current_user.0.user_id, input.order_id)
        .await?;
    Ok(Json(results))
}

/// Get the tracking records of an order
pub async fn get_order_tracking(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Vec<OrderItemTracking>>> {
    let service = AllocationService::new(state.store, &state.config.fulfillment);
    let tracking = service
        .order_tracking(current_user.0.company_id, order_id)
        .await?;
    Ok(Json(tracking))
}
