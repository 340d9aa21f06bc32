//! Pluggable storage for fulfillment records.
//!
//! [`FulfillmentStore`] is the row-level interface the services work
//! against. Every method is scoped by `company_id`; a record belonging to
//! another company behaves exactly like a missing one.
//!
//! Multi-statement sequences are not wrapped in transactions. The services
//! rely on idempotent writes instead: one tracking record per order item,
//! one receivable per `(sale, user)`, forward-only status updates, and a
//! single conditional statement for releasing an order.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared::{
    FinancialEntry, NewFinancialEntry, NewPackagingJob, NewProductionJob, NewSale, NewTracking,
    Order, OrderItem, OrderItemTracking, OrderStatus, PackagingJob, PackagingStatus, Pagination,
    Product, ProductionJob, ProductionStatus, Quantity, Sale, TrackingStatus,
};

use crate::error::AppResult;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Storage abstraction for the fulfillment pipeline.
///
/// Inserts that hit a uniqueness rule return
/// [`AppError::DuplicateEntry`](crate::error::AppError::DuplicateEntry) so
/// callers can fold the conflict into their idempotent path.
#[async_trait]
pub trait FulfillmentStore: Send + Sync {
    /// Checks the backing store is reachable.
    async fn ping(&self) -> AppResult<()>;

    // --- Orders ---

    async fn get_order(&self, company_id: Uuid, order_id: Uuid) -> AppResult<Option<Order>>;

    /// Ids of `pending` orders, oldest first.
    async fn list_pending_order_ids(&self, company_id: Uuid, limit: i64) -> AppResult<Vec<Uuid>>;

    async fn list_order_items(&self, company_id: Uuid, order_id: Uuid) -> AppResult<Vec<OrderItem>>;

    async fn get_order_item(&self, company_id: Uuid, item_id: Uuid) -> AppResult<Option<OrderItem>>;

    /// Moves the order to `target` only if that is a forward move.
    ///
    /// Returns `true` when the status was written.
    async fn advance_order_status(
        &self,
        company_id: Uuid,
        order_id: Uuid,
        target: OrderStatus,
    ) -> AppResult<bool>;

    /// Atomically releases the order for sale when it has tracking records
    /// and every one of them is `ready_for_sale`.
    ///
    /// Returns `true` only for the call that performed the transition.
    async fn release_order_if_all_ready(&self, company_id: Uuid, order_id: Uuid) -> AppResult<bool>;

    // --- Products ---

    async fn get_product(&self, company_id: Uuid, product_id: Uuid) -> AppResult<Option<Product>>;

    // --- Tracking ---

    async fn find_tracking_by_item(
        &self,
        company_id: Uuid,
        order_item_id: Uuid,
    ) -> AppResult<Option<OrderItemTracking>>;

    async fn get_tracking(
        &self,
        company_id: Uuid,
        tracking_id: Uuid,
    ) -> AppResult<Option<OrderItemTracking>>;

    async fn list_tracking_for_order(
        &self,
        company_id: Uuid,
        order_id: Uuid,
    ) -> AppResult<Vec<OrderItemTracking>>;

    /// Fails with `DuplicateEntry` if the order item is already tracked.
    async fn insert_tracking(
        &self,
        company_id: Uuid,
        tracking: &NewTracking,
    ) -> AppResult<OrderItemTracking>;

    /// Raises the record's approved packaging quantity to `approved_total`
    /// in one statement: the total is capped at the target, never decreases,
    /// and the status becomes `ready_for_sale` or `partially_ready`.
    async fn record_packaging_progress(
        &self,
        company_id: Uuid,
        tracking_id: Uuid,
        approved_total: Quantity,
    ) -> AppResult<OrderItemTracking>;

    /// Forward-only tracking status update. Returns `true` when written.
    async fn advance_tracking_status(
        &self,
        company_id: Uuid,
        tracking_id: Uuid,
        target: TrackingStatus,
    ) -> AppResult<bool>;

    // --- Production jobs ---

    async fn insert_production_job(
        &self,
        company_id: Uuid,
        job: &NewProductionJob,
    ) -> AppResult<ProductionJob>;

    async fn get_production_job(&self, company_id: Uuid, job_id: Uuid) -> AppResult<Option<ProductionJob>>;

    async fn list_production_jobs_for_tracking(
        &self,
        company_id: Uuid,
        tracking_id: Uuid,
    ) -> AppResult<Vec<ProductionJob>>;

    /// Compare-and-swap write of a production job: applied only while the
    /// stored status is still `expected`. Returns `None` when another writer
    /// got there first.
    async fn update_production_job(
        &self,
        job: &ProductionJob,
        expected: ProductionStatus,
    ) -> AppResult<Option<ProductionJob>>;

    // --- Packaging jobs ---

    async fn insert_packaging_job(
        &self,
        company_id: Uuid,
        job: &NewPackagingJob,
    ) -> AppResult<PackagingJob>;

    async fn get_packaging_job(&self, company_id: Uuid, job_id: Uuid) -> AppResult<Option<PackagingJob>>;

    async fn list_packaging_jobs_for_tracking(
        &self,
        company_id: Uuid,
        tracking_id: Uuid,
    ) -> AppResult<Vec<PackagingJob>>;

    /// Newest first.
    async fn list_packaging_jobs(
        &self,
        company_id: Uuid,
        status: Option<PackagingStatus>,
        pagination: &Pagination,
    ) -> AppResult<Vec<PackagingJob>>;

    /// Compare-and-swap write of a packaging job: applied only while the
    /// stored status is still `expected`. Returns `None` when another writer
    /// got there first.
    async fn update_packaging_job(
        &self,
        job: &PackagingJob,
        expected: PackagingStatus,
    ) -> AppResult<Option<PackagingJob>>;

    // --- Sales ---

    async fn get_sale(&self, company_id: Uuid, sale_id: Uuid) -> AppResult<Option<Sale>>;

    async fn find_sale_for_order(&self, company_id: Uuid, order_id: Uuid) -> AppResult<Option<Sale>>;

    /// Next free sequence number for sale numbers of `year`.
    async fn next_sale_sequence(&self, company_id: Uuid, year: i32) -> AppResult<i64>;

    /// Fails with `DuplicateEntry` if the order already has a sale or the
    /// sale number is taken.
    async fn insert_sale(&self, company_id: Uuid, sale: &NewSale) -> AppResult<Sale>;

    /// Marks a `pending` sale confirmed. A sale that is not pending is
    /// returned unchanged.
    async fn confirm_sale(
        &self,
        company_id: Uuid,
        sale_id: Uuid,
        confirmed_by: Uuid,
        confirmed_at: DateTime<Utc>,
    ) -> AppResult<Sale>;

    // --- Financial entries ---

    /// Receivables raised for `sale_id` by `user_id`.
    async fn find_receivables(
        &self,
        company_id: Uuid,
        sale_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Vec<FinancialEntry>>;

    /// Fails with `DuplicateEntry` when a receivable already exists for the
    /// same `(sale_id, user_id)`.
    async fn insert_financial_entry(
        &self,
        company_id: Uuid,
        entry: &NewFinancialEntry,
    ) -> AppResult<FinancialEntry>;

    async fn list_financial_entries_for_sale(
        &self,
        company_id: Uuid,
        sale_id: Uuid,
    ) -> AppResult<Vec<FinancialEntry>>;
}
