//! Order allocation service
//!
//! Splits each order line between on-hand stock and production, records the
//! split on the line's tracking record, and creates the production and
//! packaging jobs that fulfil it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::FulfillmentConfig;
use crate::error::{AppError, AppResult};
use crate::store::FulfillmentStore;
use shared::{
    compute_allocation, derive_order_status, Allocation, NewPackagingJob, NewProductionJob,
    NewTracking, Order, OrderItem, OrderItemTracking, OrderStatus, PackagingOrigin, Quantity,
    TrackingStatus,
};

/// Allocation service for pending orders
#[derive(Clone)]
pub struct AllocationService {
    store: Arc<dyn FulfillmentStore>,
    sweep_limit: i64,
}

/// Request body for an allocation run
#[derive(Debug, Default, Deserialize)]
pub struct AllocateInput {
    /// Reprocess a single order; when absent every pending order is swept
    pub order_id: Option<Uuid>,
}

/// Outcome of allocating one order
#[derive(Debug, Clone, Serialize)]
pub struct OrderAllocationResult {
    pub order_id: Uuid,
    pub order_number: Option<String>,
    pub success: bool,
    pub new_status: Option<OrderStatus>,
    pub items: Vec<ItemAllocation>,
    pub skipped: Vec<SkippedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OrderAllocationResult {
    fn failed(order_id: Uuid, message: String) -> Self {
        Self {
            order_id,
            order_number: None,
            success: false,
            new_status: None,
            items: Vec::new(),
            skipped: Vec::new(),
            error: Some(message),
        }
    }
}

/// How one line item was allocated
#[derive(Debug, Clone, Serialize)]
pub struct ItemAllocation {
    pub order_item_id: Uuid,
    pub product_id: Uuid,
    pub tracking_id: Uuid,
    pub quantity_required: Quantity,
    pub quantity_from_stock: Quantity,
    pub quantity_from_production: Quantity,
    /// Demand left uncovered by the stock cap
    pub quantity_unallocated: Quantity,
    pub status: TrackingStatus,
    /// `true` when an existing tracking record was reused
    pub reused: bool,
    pub production_job_id: Option<Uuid>,
    pub packaging_job_id: Option<Uuid>,
}

/// A line item that could not be allocated
#[derive(Debug, Clone, Serialize)]
pub struct SkippedItem {
    pub order_item_id: Uuid,
    pub reason: String,
}

impl AllocationService {
    pub fn new(store: Arc<dyn FulfillmentStore>, config: &FulfillmentConfig) -> Self {
        Self {
            store,
            sweep_limit: config.sweep_limit,
        }
    }

    /// Tracking records of an order
    pub async fn order_tracking(&self, company_id: Uuid, order_id: Uuid) -> AppResult<Vec<OrderItemTracking>> {
        if self.store.get_order(company_id, order_id).await?.is_none() {
            return Err(AppError::NotFound("Order".to_string()));
        }
        self.store.list_tracking_for_order(company_id, order_id).await
    }

    /// Allocate one order, or sweep every pending order of the company.
    ///
    /// A failure in one order is reported in its result and does not stop
    /// the rest of the sweep.
    #[tracing::instrument(skip(self))]
    pub async fn allocate(
        &self,
        company_id: Uuid,
        actor: Uuid,
        order_id: Option<Uuid>,
    ) -> AppResult<Vec<OrderAllocationResult>> {
        let order_ids = match order_id {
            Some(id) => vec![id],
            None => {
                self.store
                    .list_pending_order_ids(company_id, self.sweep_limit)
                    .await?
            }
        };

        let mut results = Vec::with_capacity(order_ids.len());
        for id in order_ids {
            match self.allocate_order(company_id, id).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!(order_id = %id, "Allocation failed: {}", e);
                    results.push(OrderAllocationResult::failed(id, e.to_string()));
                }
            }
        }

        let failed = results.iter().filter(|r| !r.success).count();
        info!(orders = results.len(), failed, "Allocation run finished");

        Ok(results)
    }

    async fn allocate_order(&self, company_id: Uuid, order_id: Uuid) -> AppResult<OrderAllocationResult> {
        let order = self
            .store
            .get_order(company_id, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let items = self.store.list_order_items(company_id, order_id).await?;

        let mut allocated = Vec::with_capacity(items.len());
        let mut skipped = Vec::new();

        for item in &items {
            let product = match self.store.get_product(company_id, item.product_id).await {
                Ok(Some(product)) => product,
                Ok(None) => {
                    warn!(order_item_id = %item.id, product_id = %item.product_id, "Product not found, skipping line");
                    skipped.push(SkippedItem {
                        order_item_id: item.id,
                        reason: "Product not found".to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    warn!(order_item_id = %item.id, "Failed to load product, skipping line: {}", e);
                    skipped.push(SkippedItem {
                        order_item_id: item.id,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let allocation = compute_allocation(product.flags(), item.quantity, product.stock_quantity);
            if allocation.unallocated_qty > 0 {
                warn!(
                    order_item_id = %item.id,
                    required = item.quantity,
                    on_hand = product.stock_quantity,
                    dropped = allocation.unallocated_qty,
                    "Demand above stock is not backordered"
                );
            }

            allocated.push(self.allocate_item(company_id, &order, item, allocation).await?);
        }

        let new_status = derive_order_status(allocated.iter().map(|a| a.status));
        self.store
            .advance_order_status(company_id, order_id, new_status)
            .await?;

        let current = self
            .store
            .get_order(company_id, order_id)
            .await?
            .map(|o| o.status)
            .unwrap_or(order.status);

        info!(
            order_id = %order_id,
            order_number = %order.order_number,
            status = %current,
            items = allocated.len(),
            skipped = skipped.len(),
            "Order allocated"
        );

        Ok(OrderAllocationResult {
            order_id,
            order_number: Some(order.order_number),
            success: true,
            new_status: Some(current),
            items: allocated,
            skipped,
            error: None,
        })
    }

    /// Upsert the line's tracking record and create whichever jobs it is
    /// still missing.
    async fn allocate_item(
        &self,
        company_id: Uuid,
        order: &Order,
        item: &OrderItem,
        allocation: Allocation,
    ) -> AppResult<ItemAllocation> {
        let (tracking, reused) = self.upsert_tracking(company_id, item, &allocation).await?;

        let mut production_job_id = None;
        if tracking.quantity_from_production > 0 {
            let existing = self
                .store
                .list_production_jobs_for_tracking(company_id, tracking.id)
                .await?;
            production_job_id = match existing.first() {
                Some(job) => Some(job.id),
                None => {
                    let job = self
                        .store
                        .insert_production_job(
                            company_id,
                            &NewProductionJob {
                                product_id: item.product_id,
                                tracking_id: Some(tracking.id),
                                order_id: Some(order.id),
                                quantity_requested: tracking.quantity_from_production,
                            },
                        )
                        .await?;
                    Some(job.id)
                }
            };
        }

        let mut packaging_job_id = None;
        if tracking.quantity_from_stock > 0 {
            let existing = self
                .store
                .list_packaging_jobs_for_tracking(company_id, tracking.id)
                .await?;
            packaging_job_id = match existing.first() {
                Some(job) => Some(job.id),
                None => {
                    let origin = PackagingOrigin::for_allocation(&tracking.allocation());
                    let job = self
                        .store
                        .insert_packaging_job(
                            company_id,
                            &NewPackagingJob {
                                product_id: item.product_id,
                                tracking_id: Some(tracking.id),
                                order_id: Some(order.id),
                                client_id: order.client_id,
                                quantity_to_package: tracking.quantity_from_stock,
                                origin,
                            },
                        )
                        .await?;
                    Some(job.id)
                }
            };
        }

        Ok(ItemAllocation {
            order_item_id: item.id,
            product_id: item.product_id,
            tracking_id: tracking.id,
            quantity_required: item.quantity,
            quantity_from_stock: tracking.quantity_from_stock,
            quantity_from_production: tracking.quantity_from_production,
            quantity_unallocated: (item.quantity - tracking.quantity_target).max(0),
            status: tracking.status,
            reused,
            production_job_id,
            packaging_job_id,
        })
    }

    /// Reuse the line's tracking record if present, otherwise insert one.
    /// A concurrent insert that wins the unique key is reused as well.
    async fn upsert_tracking(
        &self,
        company_id: Uuid,
        item: &OrderItem,
        allocation: &Allocation,
    ) -> AppResult<(OrderItemTracking, bool)> {
        if let Some(existing) = self.store.find_tracking_by_item(company_id, item.id).await? {
            return Ok((existing, true));
        }

        match self
            .store
            .insert_tracking(company_id, &NewTracking::from_allocation(item.id, allocation))
            .await
        {
            Ok(tracking) => Ok((tracking, false)),
            Err(e) if e.is_duplicate() => {
                let existing = self
                    .store
                    .find_tracking_by_item(company_id, item.id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Order item tracking".to_string()))?;
                Ok((existing, true))
            }
            Err(e) => Err(e),
        }
    }
}
