//! HTTP handlers for packaging jobs

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::packaging::{
    ListPackagingQuery, PackagingService, PackagingStatusUpdate, UpdatePackagingStatusInput,
};
use crate::AppState;
use shared::PackagingJob;

/// List packaging jobs, optionally filtered by status
pub async fn list_packaging_jobs(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListPackagingQuery>,
) -> AppResult<Json<Vec<PackagingJob>>> {
    let service = PackagingService::new(state.store);
    let jobs = service.list_jobs(current_user.0.company_id, &query).await?;
    Ok(Json(jobs))
}

/// Get a packaging job
pub async fn get_packaging_job(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<PackagingJob>> {
    let service = PackagingService::new(state.store);
    let job = service.get_job(current_user.0.company_id, job_id).await?;
    Ok(Json(job))
}

/// Move a packaging job to a new status
pub async fn update_packaging_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(job_id): Path<Uuid>,
    Json(input): Json<UpdatePackagingStatusInput>,
) -> AppResult<Json<PackagingStatusUpdate>> {
    current_user.0.require("packaging", "update")?;

    let service = PackagingService::new(state.store);
    let update = service
        .update_status(current_user.0.company_id, current_user.0.user_id, job_id, input)
        .await?;
    Ok(Json(update))
}
