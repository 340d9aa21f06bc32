//! HTTP handlers for sales and their receivables

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::sales::{SaleApproval, SaleCreation, SalesService};
use crate::AppState;
use shared::{FinancialEntry, Sale};

/// Raise a sale for an order released for sale
pub async fn create_sale_for_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<SaleCreation>)> {
    current_user.0.require("sales", "create")?;

    let service = SalesService::new(state.store, &state.config.fulfillment);
    let creation = service
        .create_sale_for_order(current_user.0.company_id, current_user.0.user_id, order_id)
        .await?;

    let status = if creation.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(creation)))
}

/// Get a sale
pub async fn get_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<Sale>> {
    let service = SalesService::new(state.store, &state.config.fulfillment);
    let sale = service.get_sale(current_user.0.company_id, sale_id).await?;
    Ok(Json(sale))
}

/// Approve a sale and raise its receivable
pub async fn approve_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<SaleApproval>> {
    current_user.0.require("sales", "approve")?;

    let service = SalesService::new(state.store, &state.config.fulfillment);
    let approval = service
        .approve_sale(current_user.0.company_id, current_user.0.user_id, sale_id)
        .await?;
    Ok(Json(approval))
}

/// List the financial entries of a sale
pub async fn list_sale_financial_entries(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<Vec<FinancialEntry>>> {
    let service = SalesService::new(state.store, &state.config.fulfillment);
    let entries = service
        .list_financial_entries(current_user.0.company_id, sale_id)
        .await?;
    Ok(Json(entries))
}
