//! HTTP handlers for production jobs

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::production::{CompleteProductionInput, ProductionCompletion, ProductionService};
use crate::AppState;
use shared::ProductionJob;

/// Start a production job
pub async fn start_production_job(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<ProductionJob>> {
    current_user.0.require("production", "update")?;

    let service = ProductionService::new(state.store);
    let job = service
        .start_job(current_user.0.company_id, current_user.0.user_id, job_id)
        .await?;
    Ok(Json(job))
}

/// Complete a production job
pub async fn complete_production_job(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(job_id): Path<Uuid>,
    input: Option<Json<CompleteProductionInput>>,
) -> AppResult<Json<ProductionCompletion>> {
    current_user.0.require("production", "update")?;

    let input = input.map(|Json(input)| input).unwrap_or_default();
    let service = ProductionService::new(state.store);
    let completion = service
        .complete_job(current_user.0.company_id, current_user.0.user_id, job_id, input)
        .await?;
    Ok(Json(completion))
}
