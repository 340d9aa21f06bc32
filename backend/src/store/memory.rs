//! In-memory store implementation for tests and local development.
//!
//! All tables live behind a single `RwLock`, so every trait method is atomic
//! with respect to every other. That makes the conditional writes
//! (`advance_*`, `release_order_if_all_ready`, unique inserts) behave like
//! their single-statement SQL counterparts.
//!
//! Not suitable for production: nothing is persisted and nothing is shared
//! across processes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use uuid::Uuid;

use shared::{
    EntryStatus, EntryType, FinancialEntry, NewFinancialEntry, NewPackagingJob, NewProductionJob,
    NewSale, NewTracking, Order, OrderItem, OrderItemTracking, OrderStatus, PackagingJob,
    PackagingStatus, Pagination, Product, ProductionJob, ProductionStatus, Quantity, Sale,
    SaleStatus, TrackingStatus,
};

use super::FulfillmentStore;
use crate::error::{AppError, AppResult};

#[derive(Debug, Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    /// Kept in insertion order, like line numbers on the order
    order_items: Vec<OrderItem>,
    products: HashMap<Uuid, Product>,
    tracking: HashMap<Uuid, OrderItemTracking>,
    production_jobs: HashMap<Uuid, ProductionJob>,
    packaging_jobs: HashMap<Uuid, PackagingJob>,
    sales: HashMap<Uuid, Sale>,
    financial_entries: Vec<FinancialEntry>,
}

impl Tables {
    fn order_of_item(&self, company_id: Uuid, item_id: Uuid) -> Option<&Order> {
        let item = self.order_items.iter().find(|i| i.id == item_id)?;
        self.orders
            .get(&item.order_id)
            .filter(|o| o.company_id == company_id)
    }

    fn tracking_of_order(&self, order_id: Uuid) -> impl Iterator<Item = &OrderItemTracking> {
        let item_ids: Vec<Uuid> = self
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .map(|i| i.id)
            .collect();
        self.tracking
            .values()
            .filter(move |t| item_ids.contains(&t.order_item_id))
    }
}

/// In-memory [`FulfillmentStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    fail_financial_inserts: AtomicBool,
    fail_next_packaging_insert: AtomicBool,
    stale_receivable_reads: AtomicBool,
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> AppError {
    AppError::Internal("store lock poisoned".to_string())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(poison_err)
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(poison_err)
    }

    // --- Seeding helpers ---

    pub fn put_order(&self, order: Order) -> AppResult<()> {
        self.write()?.orders.insert(order.id, order);
        Ok(())
    }

    pub fn put_order_item(&self, item: OrderItem) -> AppResult<()> {
        self.write()?.order_items.push(item);
        Ok(())
    }

    pub fn put_product(&self, product: Product) -> AppResult<()> {
        self.write()?.products.insert(product.id, product);
        Ok(())
    }

    pub fn set_stock(&self, product_id: Uuid, stock_quantity: Quantity) -> AppResult<()> {
        let mut tables = self.write()?;
        let product = tables
            .products
            .get_mut(&product_id)
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        product.stock_quantity = stock_quantity;
        Ok(())
    }

    pub fn remove_product(&self, product_id: Uuid) -> AppResult<()> {
        self.write()?.products.remove(&product_id);
        Ok(())
    }

    pub fn put_sale(&self, sale: Sale) -> AppResult<()> {
        self.write()?.sales.insert(sale.id, sale);
        Ok(())
    }

    // --- Fault injection ---

    /// Make every financial entry insert fail with a storage error.
    pub fn fail_financial_inserts(&self, fail: bool) {
        self.fail_financial_inserts.store(fail, Ordering::SeqCst);
    }

    /// Make the next packaging job insert fail with a storage error.
    pub fn fail_next_packaging_insert(&self) {
        self.fail_next_packaging_insert.store(true, Ordering::SeqCst);
    }

    /// Make receivable lookups return nothing, as a read racing with another
    /// writer would. Inserts still enforce uniqueness.
    pub fn stale_receivable_reads(&self, stale: bool) {
        self.stale_receivable_reads.store(stale, Ordering::SeqCst);
    }

    // --- Inspection helpers ---

    pub fn tracking_count(&self) -> AppResult<usize> {
        Ok(self.read()?.tracking.len())
    }

    pub fn production_jobs(&self) -> AppResult<Vec<ProductionJob>> {
        Ok(self.read()?.production_jobs.values().cloned().collect())
    }

    pub fn packaging_jobs(&self) -> AppResult<Vec<PackagingJob>> {
        Ok(self.read()?.packaging_jobs.values().cloned().collect())
    }

    pub fn financial_entries(&self) -> AppResult<Vec<FinancialEntry>> {
        Ok(self.read()?.financial_entries.clone())
    }
}

#[async_trait]
impl FulfillmentStore for InMemoryStore {
    async fn ping(&self) -> AppResult<()> {
        self.read().map(|_| ())
    }

    async fn get_order(&self, company_id: Uuid, order_id: Uuid) -> AppResult<Option<Order>> {
        Ok(self
            .read()?
            .orders
            .get(&order_id)
            .filter(|o| o.company_id == company_id)
            .cloned())
    }

    async fn list_pending_order_ids(&self, company_id: Uuid, limit: i64) -> AppResult<Vec<Uuid>> {
        let tables = self.read()?;
        let mut pending: Vec<&Order> = tables
            .orders
            .values()
            .filter(|o| o.company_id == company_id && o.status == OrderStatus::Pending)
            .collect();
        pending.sort_by_key(|o| (o.created_at, o.id));
        Ok(pending
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|o| o.id)
            .collect())
    }

    async fn list_order_items(&self, company_id: Uuid, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
        let tables = self.read()?;
        if !tables
            .orders
            .get(&order_id)
            .is_some_and(|o| o.company_id == company_id)
        {
            return Ok(Vec::new());
        }
        Ok(tables
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn get_order_item(&self, company_id: Uuid, item_id: Uuid) -> AppResult<Option<OrderItem>> {
        let tables = self.read()?;
        if tables.order_of_item(company_id, item_id).is_none() {
            return Ok(None);
        }
        Ok(tables.order_items.iter().find(|i| i.id == item_id).cloned())
    }

    async fn advance_order_status(
        &self,
        company_id: Uuid,
        order_id: Uuid,
        target: OrderStatus,
    ) -> AppResult<bool> {
        let mut tables = self.write()?;
        match tables.orders.get_mut(&order_id) {
            Some(order) if order.company_id == company_id && order.status.can_advance_to(target) => {
                order.status = target;
                order.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_order_if_all_ready(&self, company_id: Uuid, order_id: Uuid) -> AppResult<bool> {
        let mut tables = self.write()?;

        let eligible = tables.orders.get(&order_id).is_some_and(|o| {
            o.company_id == company_id && o.status.can_advance_to(OrderStatus::ReleasedForSale)
        });
        if !eligible {
            return Ok(false);
        }

        let mut any = false;
        let all_ready = tables.tracking_of_order(order_id).all(|t| {
            any = true;
            t.status == TrackingStatus::ReadyForSale
        });
        if !any || !all_ready {
            return Ok(false);
        }

        if let Some(order) = tables.orders.get_mut(&order_id) {
            order.status = OrderStatus::ReleasedForSale;
            order.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn get_product(&self, company_id: Uuid, product_id: Uuid) -> AppResult<Option<Product>> {
        Ok(self
            .read()?
            .products
            .get(&product_id)
            .filter(|p| p.company_id == company_id)
            .cloned())
    }

    async fn find_tracking_by_item(
        &self,
        company_id: Uuid,
        order_item_id: Uuid,
    ) -> AppResult<Option<OrderItemTracking>> {
        Ok(self
            .read()?
            .tracking
            .values()
            .find(|t| t.company_id == company_id && t.order_item_id == order_item_id)
            .cloned())
    }

    async fn get_tracking(
        &self,
        company_id: Uuid,
        tracking_id: Uuid,
    ) -> AppResult<Option<OrderItemTracking>> {
        Ok(self
            .read()?
            .tracking
            .get(&tracking_id)
            .filter(|t| t.company_id == company_id)
            .cloned())
    }

    async fn list_tracking_for_order(
        &self,
        company_id: Uuid,
        order_id: Uuid,
    ) -> AppResult<Vec<OrderItemTracking>> {
        let tables = self.read()?;
        let mut records: Vec<OrderItemTracking> = tables
            .tracking_of_order(order_id)
            .filter(|t| t.company_id == company_id)
            .cloned()
            .collect();
        records.sort_by_key(|t| t.created_at);
        Ok(records)
    }

    async fn insert_tracking(
        &self,
        company_id: Uuid,
        tracking: &NewTracking,
    ) -> AppResult<OrderItemTracking> {
        let mut tables = self.write()?;
        if tables
            .tracking
            .values()
            .any(|t| t.order_item_id == tracking.order_item_id)
        {
            return Err(AppError::DuplicateEntry("Order item tracking".to_string()));
        }

        let now = Utc::now();
        let record = OrderItemTracking {
            id: Uuid::new_v4(),
            company_id,
            order_item_id: tracking.order_item_id,
            quantity_target: tracking.quantity_target,
            quantity_from_stock: tracking.quantity_from_stock,
            quantity_from_production: tracking.quantity_from_production,
            quantity_packaged_approved: 0,
            status: tracking.status,
            created_at: now,
            updated_at: now,
        };
        tables.tracking.insert(record.id, record.clone());
        Ok(record)
    }

    async fn record_packaging_progress(
        &self,
        company_id: Uuid,
        tracking_id: Uuid,
        approved_total: Quantity,
    ) -> AppResult<OrderItemTracking> {
        let mut tables = self.write()?;
        let record = tables
            .tracking
            .get_mut(&tracking_id)
            .filter(|t| t.company_id == company_id)
            .ok_or_else(|| AppError::NotFound("Order item tracking".to_string()))?;

        let (total, status) = record.with_approved_total(approved_total);
        record.quantity_packaged_approved = total;
        record.status = status;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn advance_tracking_status(
        &self,
        company_id: Uuid,
        tracking_id: Uuid,
        target: TrackingStatus,
    ) -> AppResult<bool> {
        let mut tables = self.write()?;
        match tables.tracking.get_mut(&tracking_id) {
            Some(record)
                if record.company_id == company_id
                    && target.predecessors().contains(&record.status) =>
            {
                record.status = target;
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_production_job(
        &self,
        company_id: Uuid,
        job: &NewProductionJob,
    ) -> AppResult<ProductionJob> {
        let record = ProductionJob {
            id: Uuid::new_v4(),
            company_id,
            product_id: job.product_id,
            tracking_id: job.tracking_id,
            order_id: job.order_id,
            quantity_requested: job.quantity_requested,
            quantity_produced: 0,
            status: ProductionStatus::Pending,
            started_by: None,
            started_at: None,
            completed_by: None,
            completed_at: None,
            created_at: Utc::now(),
        };
        self.write()?.production_jobs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_production_job(&self, company_id: Uuid, job_id: Uuid) -> AppResult<Option<ProductionJob>> {
        Ok(self
            .read()?
            .production_jobs
            .get(&job_id)
            .filter(|j| j.company_id == company_id)
            .cloned())
    }

    async fn list_production_jobs_for_tracking(
        &self,
        company_id: Uuid,
        tracking_id: Uuid,
    ) -> AppResult<Vec<ProductionJob>> {
        Ok(self
            .read()?
            .production_jobs
            .values()
            .filter(|j| j.company_id == company_id && j.tracking_id == Some(tracking_id))
            .cloned()
            .collect())
    }

    async fn update_production_job(
        &self,
        job: &ProductionJob,
        expected: ProductionStatus,
    ) -> AppResult<Option<ProductionJob>> {
        let mut tables = self.write()?;
        match tables.production_jobs.get_mut(&job.id) {
            Some(existing) if existing.company_id == job.company_id => {
                if existing.status != expected {
                    return Ok(None);
                }
                *existing = job.clone();
                Ok(Some(job.clone()))
            }
            _ => Err(AppError::NotFound("Production job".to_string())),
        }
    }

    async fn insert_packaging_job(
        &self,
        company_id: Uuid,
        job: &NewPackagingJob,
    ) -> AppResult<PackagingJob> {
        if self.fail_next_packaging_insert.swap(false, Ordering::SeqCst) {
            return Err(AppError::Internal("packaging job insert failed".to_string()));
        }

        let now = Utc::now();
        let record = PackagingJob {
            id: Uuid::new_v4(),
            company_id,
            product_id: job.product_id,
            tracking_id: job.tracking_id,
            order_id: job.order_id,
            client_id: job.client_id,
            quantity_to_package: job.quantity_to_package,
            quantity_packaged: 0,
            status: PackagingStatus::Pending,
            quality_check: false,
            origin: job.origin,
            packaged_by: None,
            packaged_at: None,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        };
        self.write()?.packaging_jobs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_packaging_job(&self, company_id: Uuid, job_id: Uuid) -> AppResult<Option<PackagingJob>> {
        Ok(self
            .read()?
            .packaging_jobs
            .get(&job_id)
            .filter(|j| j.company_id == company_id)
            .cloned())
    }

    async fn list_packaging_jobs_for_tracking(
        &self,
        company_id: Uuid,
        tracking_id: Uuid,
    ) -> AppResult<Vec<PackagingJob>> {
        let tables = self.read()?;
        let mut jobs: Vec<PackagingJob> = tables
            .packaging_jobs
            .values()
            .filter(|j| j.company_id == company_id && j.tracking_id == Some(tracking_id))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    async fn list_packaging_jobs(
        &self,
        company_id: Uuid,
        status: Option<PackagingStatus>,
        pagination: &Pagination,
    ) -> AppResult<Vec<PackagingJob>> {
        let tables = self.read()?;
        let mut jobs: Vec<&PackagingJob> = tables
            .packaging_jobs
            .values()
            .filter(|j| j.company_id == company_id)
            .filter(|j| status.map_or(true, |s| j.status == s))
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs
            .into_iter()
            .skip(usize::try_from(pagination.offset()).unwrap_or(usize::MAX))
            .take(pagination.per_page as usize)
            .cloned()
            .collect())
    }

    async fn update_packaging_job(
        &self,
        job: &PackagingJob,
        expected: PackagingStatus,
    ) -> AppResult<Option<PackagingJob>> {
        let mut tables = self.write()?;
        match tables.packaging_jobs.get_mut(&job.id) {
            Some(existing) if existing.company_id == job.company_id => {
                if existing.status != expected {
                    return Ok(None);
                }
                let mut saved = job.clone();
                saved.updated_at = Utc::now();
                *existing = saved.clone();
                Ok(Some(saved))
            }
            _ => Err(AppError::NotFound("Packaging job".to_string())),
        }
    }

    async fn get_sale(&self, company_id: Uuid, sale_id: Uuid) -> AppResult<Option<Sale>> {
        Ok(self
            .read()?
            .sales
            .get(&sale_id)
            .filter(|s| s.company_id == company_id)
            .cloned())
    }

    async fn find_sale_for_order(&self, company_id: Uuid, order_id: Uuid) -> AppResult<Option<Sale>> {
        Ok(self
            .read()?
            .sales
            .values()
            .find(|s| s.company_id == company_id && s.order_id == Some(order_id))
            .cloned())
    }

    async fn next_sale_sequence(&self, company_id: Uuid, year: i32) -> AppResult<i64> {
        let count = self
            .read()?
            .sales
            .values()
            .filter(|s| s.company_id == company_id && s.created_at.year() == year)
            .count();
        Ok(count as i64 + 1)
    }

    async fn insert_sale(&self, company_id: Uuid, sale: &NewSale) -> AppResult<Sale> {
        let mut tables = self.write()?;
        let conflict = tables.sales.values().any(|s| {
            s.company_id == company_id
                && (s.sale_number == sale.sale_number
                    || (sale.order_id.is_some() && s.order_id == sale.order_id))
        });
        if conflict {
            return Err(AppError::DuplicateEntry("Sale".to_string()));
        }

        let record = Sale {
            id: Uuid::new_v4(),
            company_id,
            order_id: sale.order_id,
            sale_number: sale.sale_number.clone(),
            client_id: sale.client_id,
            client_name: sale.client_name.clone(),
            total_amount: sale.total_amount,
            payment_method: sale.payment_method.clone(),
            payment_term: sale.payment_term.clone(),
            status: SaleStatus::Pending,
            confirmed_by: None,
            confirmed_at: None,
            created_by: sale.created_by,
            created_at: Utc::now(),
        };
        tables.sales.insert(record.id, record.clone());
        Ok(record)
    }

    async fn confirm_sale(
        &self,
        company_id: Uuid,
        sale_id: Uuid,
        confirmed_by: Uuid,
        confirmed_at: DateTime<Utc>,
    ) -> AppResult<Sale> {
        let mut tables = self.write()?;
        let sale = tables
            .sales
            .get_mut(&sale_id)
            .filter(|s| s.company_id == company_id)
            .ok_or_else(|| AppError::NotFound("Sale".to_string()))?;

        if sale.status == SaleStatus::Pending {
            sale.status = SaleStatus::Confirmed;
            sale.confirmed_by = Some(confirmed_by);
            sale.confirmed_at = Some(confirmed_at);
        }
        Ok(sale.clone())
    }

    async fn find_receivables(
        &self,
        company_id: Uuid,
        sale_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Vec<FinancialEntry>> {
        if self.stale_receivable_reads.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(self
            .read()?
            .financial_entries
            .iter()
            .filter(|e| {
                e.company_id == company_id
                    && e.sale_id == Some(sale_id)
                    && e.user_id == user_id
                    && e.entry_type == EntryType::Receivable
            })
            .cloned()
            .collect())
    }

    async fn insert_financial_entry(
        &self,
        company_id: Uuid,
        entry: &NewFinancialEntry,
    ) -> AppResult<FinancialEntry> {
        if self.fail_financial_inserts.load(Ordering::SeqCst) {
            return Err(AppError::Internal("financial entry insert failed".to_string()));
        }

        let mut tables = self.write()?;
        let duplicate = entry.entry_type == EntryType::Receivable
            && entry.sale_id.is_some()
            && tables.financial_entries.iter().any(|e| {
                e.entry_type == EntryType::Receivable
                    && e.sale_id == entry.sale_id
                    && e.user_id == entry.user_id
            });
        if duplicate {
            return Err(AppError::DuplicateEntry("Receivable".to_string()));
        }

        let record = FinancialEntry {
            id: Uuid::new_v4(),
            company_id,
            user_id: entry.user_id,
            sale_id: entry.sale_id,
            entry_type: entry.entry_type,
            description: entry.description.clone(),
            amount: entry.amount,
            due_date: entry.due_date,
            status: EntryStatus::Pending,
            created_at: Utc::now(),
        };
        tables.financial_entries.push(record.clone());
        Ok(record)
    }

    async fn list_financial_entries_for_sale(
        &self,
        company_id: Uuid,
        sale_id: Uuid,
    ) -> AppResult<Vec<FinancialEntry>> {
        Ok(self
            .read()?
            .financial_entries
            .iter()
            .filter(|e| e.company_id == company_id && e.sale_id == Some(sale_id))
            .cloned()
            .collect())
    }
}
