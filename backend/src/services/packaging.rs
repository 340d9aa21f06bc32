//! Packaging job service
//!
//! Drives the packaging state machine. Approving a job credits its line's
//! tracking record and releases the order once every line is ready.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::store::FulfillmentStore;
use shared::{
    validate_approved_quantity, validate_packaged_quantity, OrderItemTracking, PackagingJob,
    PackagingStatus, Pagination, Quantity,
};

/// Packaging service
#[derive(Clone)]
pub struct PackagingService {
    store: Arc<dyn FulfillmentStore>,
}

/// Input for a packaging status change
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePackagingStatusInput {
    pub status: PackagingStatus,
    #[validate(range(min = 0))]
    pub quantity_packaged: Option<i64>,
    pub quality_check: Option<bool>,
}

/// Query parameters for listing packaging jobs
#[derive(Debug, Default, Deserialize)]
pub struct ListPackagingQuery {
    pub status: Option<PackagingStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ListPackagingQuery {
    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(defaults.page).max(1),
            per_page: self.per_page.unwrap_or(defaults.per_page).clamp(1, 200),
        }
    }
}

/// Result of a packaging status change
#[derive(Debug, Clone, Serialize)]
pub struct PackagingStatusUpdate {
    pub job: PackagingJob,
    /// Tracking record after the approval cascade, if one ran
    pub tracking: Option<OrderItemTracking>,
    /// `true` when this call released the order for sale
    pub order_released: bool,
}

impl PackagingService {
    pub fn new(store: Arc<dyn FulfillmentStore>) -> Self {
        Self { store }
    }

    pub async fn list_jobs(
        &self,
        company_id: Uuid,
        query: &ListPackagingQuery,
    ) -> AppResult<Vec<PackagingJob>> {
        self.store
            .list_packaging_jobs(company_id, query.status, &query.pagination())
            .await
    }

    pub async fn get_job(&self, company_id: Uuid, job_id: Uuid) -> AppResult<PackagingJob> {
        self.store
            .get_packaging_job(company_id, job_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Packaging job".to_string()))
    }

    /// Move a packaging job to a new status.
    ///
    /// Re-approving an approved job writes nothing but re-runs the approval
    /// cascade, so a caller can retry after a partial failure.
    #[tracing::instrument(skip(self, input), fields(status = %input.status))]
    pub async fn update_status(
        &self,
        company_id: Uuid,
        actor: Uuid,
        job_id: Uuid,
        input: UpdatePackagingStatusInput,
    ) -> AppResult<PackagingStatusUpdate> {
        input.validate()?;

        let job = self.get_job(company_id, job_id).await?;
        let current = job.status;
        let retry = current == PackagingStatus::Approved && input.status == PackagingStatus::Approved;

        if !retry && !current.can_transition_to(input.status) {
            return Err(AppError::InvalidStateTransition(format!(
                "Cannot move packaging job from {} to {}",
                current, input.status
            )));
        }

        if let Some(quantity) = input.quantity_packaged {
            validate_packaged_quantity(&job, quantity)
                .map_err(|msg| AppError::invalid("quantity_packaged", msg))?;
            if input.status == PackagingStatus::Approved {
                validate_approved_quantity(quantity)
                    .map_err(|msg| AppError::invalid("quantity_packaged", msg))?;
            }
        }

        let job = if retry {
            job
        } else {
            let mut next = job.clone();
            next.status = input.status;
            if let Some(quantity) = input.quantity_packaged {
                next.quantity_packaged = quantity;
            }
            if let Some(quality_check) = input.quality_check {
                next.quality_check = quality_check;
            }

            let now = Utc::now();
            match input.status {
                PackagingStatus::InProgress => {
                    next.packaged_by = Some(actor);
                    next.packaged_at = Some(now);
                }
                PackagingStatus::Approved => {
                    next.approved_by = Some(actor);
                    next.approved_at = Some(now);
                }
                _ => {}
            }

            self.store
                .update_packaging_job(&next, current)
                .await?
                .ok_or_else(|| {
                    AppError::InvalidStateTransition(
                        "Packaging job was changed by another request".to_string(),
                    )
                })?
        };

        info!(job_id = %job.id, from = %current, to = %job.status, "Packaging status updated");

        if job.status != PackagingStatus::Approved {
            return Ok(PackagingStatusUpdate {
                job,
                tracking: None,
                order_released: false,
            });
        }

        self.on_approved(company_id, job).await
    }

    /// Credit the line's tracking record with everything approved so far and
    /// try to release the order.
    async fn on_approved(&self, company_id: Uuid, job: PackagingJob) -> AppResult<PackagingStatusUpdate> {
        let Some(tracking_id) = job.tracking_id else {
            return Ok(PackagingStatusUpdate {
                job,
                tracking: None,
                order_released: false,
            });
        };

        let approved_total: Quantity = self
            .store
            .list_packaging_jobs_for_tracking(company_id, tracking_id)
            .await?
            .iter()
            .filter(|j| j.status == PackagingStatus::Approved)
            .map(PackagingJob::approved_quantity)
            .sum();

        let tracking = match self
            .store
            .record_packaging_progress(company_id, tracking_id, approved_total)
            .await
        {
            Ok(tracking) => tracking,
            Err(AppError::NotFound(_)) => {
                warn!(job_id = %job.id, tracking_id = %tracking_id, "Approved job references missing tracking record");
                return Ok(PackagingStatusUpdate {
                    job,
                    tracking: None,
                    order_released: false,
                });
            }
            Err(e) => return Err(e),
        };

        let order_id = match job.order_id {
            Some(order_id) => Some(order_id),
            None => self
                .store
                .get_order_item(company_id, tracking.order_item_id)
                .await?
                .map(|item| item.order_id),
        };

        let order_released = match order_id {
            Some(order_id) => {
                let released = self
                    .store
                    .release_order_if_all_ready(company_id, order_id)
                    .await?;
                if released {
                    info!(order_id = %order_id, "Order released for sale");
                }
                released
            }
            None => false,
        };

        Ok(PackagingStatusUpdate {
            job,
            tracking: Some(tracking),
            order_released,
        })
    }
}
