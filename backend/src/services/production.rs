//! Production job service

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::store::FulfillmentStore;
use shared::{
    derive_order_status, validate_produced_quantity, NewPackagingJob, PackagingJob,
    PackagingOrigin, ProductionJob, ProductionStatus, TrackingStatus,
};

/// Production service
#[derive(Clone)]
pub struct ProductionService {
    store: Arc<dyn FulfillmentStore>,
}

/// Input for completing a production job
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CompleteProductionInput {
    /// Units actually produced; defaults to the requested quantity
    #[validate(range(min = 1))]
    pub quantity_produced: Option<i64>,
}

/// Result of completing a production job
#[derive(Debug, Clone, Serialize)]
pub struct ProductionCompletion {
    pub job: ProductionJob,
    /// Packaging job created for the produced goods
    pub packaging_job: Option<PackagingJob>,
}

impl ProductionService {
    pub fn new(store: Arc<dyn FulfillmentStore>) -> Self {
        Self { store }
    }

    pub async fn get_job(&self, company_id: Uuid, job_id: Uuid) -> AppResult<ProductionJob> {
        self.store
            .get_production_job(company_id, job_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Production job".to_string()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn start_job(&self, company_id: Uuid, actor: Uuid, job_id: Uuid) -> AppResult<ProductionJob> {
        let job = self.get_job(company_id, job_id).await?;
        let mut next = job.clone();
        next.status = ProductionStatus::InProgress;
        next.started_by = Some(actor);
        next.started_at = Some(Utc::now());

        let job = self.transition(job.status, next).await?;
        info!(job_id = %job.id, "Production started");
        Ok(job)
    }

    /// Complete a production job and hand the produced goods to packaging.
    ///
    /// Calling this again on a completed job writes nothing to the job but
    /// finishes any hand-off step a failed earlier call left undone.
    #[tracing::instrument(skip(self, input))]
    pub async fn complete_job(
        &self,
        company_id: Uuid,
        actor: Uuid,
        job_id: Uuid,
        input: CompleteProductionInput,
    ) -> AppResult<ProductionCompletion> {
        input.validate()?;

        let job = self.get_job(company_id, job_id).await?;
        let job = if job.status == ProductionStatus::Completed {
            info!(job_id = %job.id, "Production already completed, resuming hand-off");
            job
        } else {
            let produced = input.quantity_produced.unwrap_or(job.quantity_requested);
            validate_produced_quantity(produced)
                .map_err(|msg| AppError::invalid("quantity_produced", msg))?;

            let mut next = job.clone();
            next.status = ProductionStatus::Completed;
            next.quantity_produced = produced;
            next.completed_by = Some(actor);
            next.completed_at = Some(Utc::now());
            if next.started_at.is_none() {
                next.started_by = Some(actor);
                next.started_at = next.completed_at;
            }

            let job = self.transition(job.status, next).await?;
            info!(job_id = %job.id, produced, "Production completed");
            job
        };
        let produced = job.quantity_produced;

        let Some(tracking_id) = job.tracking_id else {
            return Ok(ProductionCompletion {
                job,
                packaging_job: None,
            });
        };

        let tracking = self
            .store
            .get_tracking(company_id, tracking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order item tracking".to_string()))?;

        let order_item = self.store.get_order_item(company_id, tracking.order_item_id).await?;
        let order_id = job.order_id.or(order_item.map(|item| item.order_id));
        let client_id = match order_id {
            Some(order_id) => self
                .store
                .get_order(company_id, order_id)
                .await?
                .and_then(|order| order.client_id),
            None => None,
        };

        // Goods beyond the line's production share are not packaged for it.
        let quantity_to_package = if tracking.quantity_from_production > 0 {
            produced.min(tracking.quantity_from_production)
        } else {
            produced
        };
        let existing = self
            .store
            .list_packaging_jobs_for_tracking(company_id, tracking_id)
            .await?
            .into_iter()
            .find(|j| j.origin == PackagingOrigin::Production);
        let packaging_job = match existing {
            Some(packaging_job) => packaging_job,
            None => {
                self.store
                    .insert_packaging_job(
                        company_id,
                        &NewPackagingJob {
                            product_id: job.product_id,
                            tracking_id: Some(tracking_id),
                            order_id,
                            client_id,
                            quantity_to_package,
                            origin: PackagingOrigin::Production,
                        },
                    )
                    .await?
            }
        };

        self.store
            .advance_tracking_status(company_id, tracking_id, TrackingStatus::InPackaging)
            .await?;

        if let Some(order_id) = order_id {
            let statuses = self
                .store
                .list_tracking_for_order(company_id, order_id)
                .await?
                .into_iter()
                .map(|t| t.status);
            self.store
                .advance_order_status(company_id, order_id, derive_order_status(statuses))
                .await?;
        }

        Ok(ProductionCompletion {
            job,
            packaging_job: Some(packaging_job),
        })
    }

    async fn transition(&self, current: ProductionStatus, next: ProductionJob) -> AppResult<ProductionJob> {
        if !current.can_transition_to(next.status) {
            return Err(AppError::InvalidStateTransition(format!(
                "Cannot move production job from {} to {}",
                current, next.status
            )));
        }

        self.store
            .update_production_job(&next, current)
            .await?
            .ok_or_else(|| {
                AppError::InvalidStateTransition(
                    "Production job was changed by another request".to_string(),
                )
            })
    }
}
