//! Route definitions for the ERP fulfillment service

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        .merge(protected_routes(state))
}

/// Routes that require a bearer token
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/fulfillment/allocate", post(handlers::allocate_orders))
        .route("/orders/:order_id/tracking", get(handlers::get_order_tracking))
        .route("/orders/:order_id/sale", post(handlers::create_sale_for_order))
        .nest("/packaging", packaging_routes())
        .nest("/production", production_routes())
        .nest("/sales", sales_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Packaging job routes
fn packaging_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_packaging_jobs))
        .route("/:job_id", get(handlers::get_packaging_job))
        .route("/:job_id/status", put(handlers::update_packaging_status))
}

/// Production job routes
fn production_routes() -> Router<AppState> {
    Router::new()
        .route("/:job_id/start", put(handlers::start_production_job))
        .route("/:job_id/complete", put(handlers::complete_production_job))
}

/// Sales routes
fn sales_routes() -> Router<AppState> {
    Router::new()
        .route("/:sale_id", get(handlers::get_sale))
        .route("/:sale_id/approve", post(handlers::approve_sale))
        .route(
            "/:sale_id/financial-entries",
            get(handlers::list_sale_financial_entries),
        )
}
