//! PostgreSQL store backed by `sqlx`.
//!
//! Status columns are plain `TEXT` guarded by `CHECK` constraints and are
//! converted through the shared enums' `as_str` / `FromStr`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::{
    FinancialEntry, NewFinancialEntry, NewPackagingJob, NewProductionJob, NewSale, NewTracking,
    Order, OrderItem, OrderItemTracking, OrderStatus, PackagingJob, PackagingStatus, Pagination,
    Product, ProductionJob, ProductionStatus, Quantity, Sale, TrackingStatus,
};

use super::FulfillmentStore;
use crate::error::{AppError, AppResult};

/// PostgreSQL [`FulfillmentStore`].
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

/// Map a unique-constraint violation to `DuplicateEntry`, anything else to a
/// database error.
fn map_unique(err: sqlx::Error, resource: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::DuplicateEntry(resource.to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}

fn status_strings<I, T>(statuses: I, as_str: fn(&T) -> &'static str) -> Vec<String>
where
    I: IntoIterator<Item = T>,
{
    statuses.into_iter().map(|s| as_str(&s).to_string()).collect()
}

// ============================================================================
// Rows
// ============================================================================

const ORDER_COLUMNS: &str = "id, company_id, order_number, client_id, client_name, status, \
     total_amount, payment_method, payment_term, created_at, updated_at";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    company_id: Uuid,
    order_number: String,
    client_id: Option<Uuid>,
    client_name: String,
    status: String,
    total_amount: Decimal,
    payment_method: Option<String>,
    payment_term: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> AppResult<Self> {
        Ok(Order {
            id: row.id,
            company_id: row.company_id,
            order_number: row.order_number,
            client_id: row.client_id,
            client_name: row.client_name,
            status: row.status.parse()?,
            total_amount: row.total_amount,
            payment_method: row.payment_method,
            payment_term: row.payment_term,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i64,
    unit_price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    company_id: Uuid,
    name: String,
    stock_quantity: i64,
    is_direct_sale: bool,
    is_manufactured: bool,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            company_id: row.company_id,
            name: row.name,
            stock_quantity: row.stock_quantity,
            is_direct_sale: row.is_direct_sale,
            is_manufactured: row.is_manufactured,
        }
    }
}

const TRACKING_COLUMNS: &str = "t.id, t.company_id, t.order_item_id, t.quantity_target, \
     t.quantity_from_stock, t.quantity_from_production, t.quantity_packaged_approved, t.status, \
     t.created_at, t.updated_at";

#[derive(Debug, FromRow)]
struct TrackingRow {
    id: Uuid,
    company_id: Uuid,
    order_item_id: Uuid,
    quantity_target: i64,
    quantity_from_stock: i64,
    quantity_from_production: i64,
    quantity_packaged_approved: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TrackingRow> for OrderItemTracking {
    type Error = AppError;

    fn try_from(row: TrackingRow) -> AppResult<Self> {
        Ok(OrderItemTracking {
            id: row.id,
            company_id: row.company_id,
            order_item_id: row.order_item_id,
            quantity_target: row.quantity_target,
            quantity_from_stock: row.quantity_from_stock,
            quantity_from_production: row.quantity_from_production,
            quantity_packaged_approved: row.quantity_packaged_approved,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PRODUCTION_COLUMNS: &str = "id, company_id, product_id, tracking_id, order_id, \
     quantity_requested, quantity_produced, status, started_by, started_at, completed_by, \
     completed_at, created_at";

#[derive(Debug, FromRow)]
struct ProductionRow {
    id: Uuid,
    company_id: Uuid,
    product_id: Uuid,
    tracking_id: Option<Uuid>,
    order_id: Option<Uuid>,
    quantity_requested: i64,
    quantity_produced: i64,
    status: String,
    started_by: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    completed_by: Option<Uuid>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductionRow> for ProductionJob {
    type Error = AppError;

    fn try_from(row: ProductionRow) -> AppResult<Self> {
        Ok(ProductionJob {
            id: row.id,
            company_id: row.company_id,
            product_id: row.product_id,
            tracking_id: row.tracking_id,
            order_id: row.order_id,
            quantity_requested: row.quantity_requested,
            quantity_produced: row.quantity_produced,
            status: row.status.parse()?,
            started_by: row.started_by,
            started_at: row.started_at,
            completed_by: row.completed_by,
            completed_at: row.completed_at,
            created_at: row.created_at,
        })
    }
}

const PACKAGING_COLUMNS: &str = "id, company_id, product_id, tracking_id, order_id, client_id, \
     quantity_to_package, quantity_packaged, status, quality_check, origin, packaged_by, \
     packaged_at, approved_by, approved_at, created_at, updated_at";

#[derive(Debug, FromRow)]
struct PackagingRow {
    id: Uuid,
    company_id: Uuid,
    product_id: Uuid,
    tracking_id: Option<Uuid>,
    order_id: Option<Uuid>,
    client_id: Option<Uuid>,
    quantity_to_package: i64,
    quantity_packaged: i64,
    status: String,
    quality_check: bool,
    origin: String,
    packaged_by: Option<Uuid>,
    packaged_at: Option<DateTime<Utc>>,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PackagingRow> for PackagingJob {
    type Error = AppError;

    fn try_from(row: PackagingRow) -> AppResult<Self> {
        Ok(PackagingJob {
            id: row.id,
            company_id: row.company_id,
            product_id: row.product_id,
            tracking_id: row.tracking_id,
            order_id: row.order_id,
            client_id: row.client_id,
            quantity_to_package: row.quantity_to_package,
            quantity_packaged: row.quantity_packaged,
            status: row.status.parse()?,
            quality_check: row.quality_check,
            origin: row.origin.parse()?,
            packaged_by: row.packaged_by,
            packaged_at: row.packaged_at,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SALE_COLUMNS: &str = "id, company_id, order_id, sale_number, client_id, client_name, \
     total_amount, payment_method, payment_term, status, confirmed_by, confirmed_at, created_by, \
     created_at";

#[derive(Debug, FromRow)]
struct SaleRow {
    id: Uuid,
    company_id: Uuid,
    order_id: Option<Uuid>,
    sale_number: String,
    client_id: Option<Uuid>,
    client_name: String,
    total_amount: Decimal,
    payment_method: Option<String>,
    payment_term: Option<String>,
    status: String,
    confirmed_by: Option<Uuid>,
    confirmed_at: Option<DateTime<Utc>>,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SaleRow> for Sale {
    type Error = AppError;

    fn try_from(row: SaleRow) -> AppResult<Self> {
        Ok(Sale {
            id: row.id,
            company_id: row.company_id,
            order_id: row.order_id,
            sale_number: row.sale_number,
            client_id: row.client_id,
            client_name: row.client_name,
            total_amount: row.total_amount,
            payment_method: row.payment_method,
            payment_term: row.payment_term,
            status: row.status.parse()?,
            confirmed_by: row.confirmed_by,
            confirmed_at: row.confirmed_at,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

const ENTRY_COLUMNS: &str =
    "id, company_id, user_id, sale_id, entry_type, description, amount, due_date, status, created_at";

#[derive(Debug, FromRow)]
struct EntryRow {
    id: Uuid,
    company_id: Uuid,
    user_id: Uuid,
    sale_id: Option<Uuid>,
    entry_type: String,
    description: String,
    amount: Decimal,
    due_date: NaiveDate,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for FinancialEntry {
    type Error = AppError;

    fn try_from(row: EntryRow) -> AppResult<Self> {
        Ok(FinancialEntry {
            id: row.id,
            company_id: row.company_id,
            user_id: row.user_id,
            sale_id: row.sale_id,
            entry_type: row.entry_type.parse()?,
            description: row.description,
            amount: row.amount,
            due_date: row.due_date,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ============================================================================
// Store
// ============================================================================

#[async_trait]
impl FulfillmentStore for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn get_order(&self, company_id: Uuid, order_id: Uuid) -> AppResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1 AND company_id = $2",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn list_pending_order_ids(&self, company_id: Uuid, limit: i64) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM orders
            WHERE company_id = $1 AND status = 'pending'
            ORDER BY created_at, id
            LIMIT $2
            "#,
        )
        .bind(company_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(ids)
    }

    async fn list_order_items(&self, company_id: Uuid, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT i.id, i.order_id, i.product_id, i.quantity, i.unit_price
            FROM order_items i
            JOIN orders o ON o.id = i.order_id
            WHERE i.order_id = $1 AND o.company_id = $2
            ORDER BY i.created_at, i.id
            "#,
        )
        .bind(order_id)
        .bind(company_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    async fn get_order_item(&self, company_id: Uuid, item_id: Uuid) -> AppResult<Option<OrderItem>> {
        let row = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT i.id, i.order_id, i.product_id, i.quantity, i.unit_price
            FROM order_items i
            JOIN orders o ON o.id = i.order_id
            WHERE i.id = $1 AND o.company_id = $2
            "#,
        )
        .bind(item_id)
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(OrderItem::from))
    }

    async fn advance_order_status(
        &self,
        company_id: Uuid,
        order_id: Uuid,
        target: OrderStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND company_id = $2 AND status = ANY($4)
            "#,
        )
        .bind(order_id)
        .bind(company_id)
        .bind(target.as_str())
        .bind(status_strings(target.predecessors(), OrderStatus::as_str))
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn release_order_if_all_ready(&self, company_id: Uuid, order_id: Uuid) -> AppResult<bool> {
        // Check and write in one statement; a concurrent release re-evaluates
        // the status predicate after the row lock and updates nothing.
        let result = sqlx::query(
            r#"
            UPDATE orders o
            SET status = 'released_for_sale', updated_at = NOW()
            WHERE o.id = $1 AND o.company_id = $2 AND o.status = ANY($3)
              AND EXISTS (
                  SELECT 1 FROM order_item_tracking t
                  JOIN order_items i ON i.id = t.order_item_id
                  WHERE i.order_id = o.id
              )
              AND NOT EXISTS (
                  SELECT 1 FROM order_item_tracking t
                  JOIN order_items i ON i.id = t.order_item_id
                  WHERE i.order_id = o.id AND t.status <> 'ready_for_sale'
              )
            "#,
        )
        .bind(order_id)
        .bind(company_id)
        .bind(status_strings(
            OrderStatus::ReleasedForSale.predecessors(),
            OrderStatus::as_str,
        ))
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_product(&self, company_id: Uuid, product_id: Uuid) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, company_id, name, stock_quantity, is_direct_sale, is_manufactured
            FROM products
            WHERE id = $1 AND company_id = $2
            "#,
        )
        .bind(product_id)
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn find_tracking_by_item(
        &self,
        company_id: Uuid,
        order_item_id: Uuid,
    ) -> AppResult<Option<OrderItemTracking>> {
        let row = sqlx::query_as::<_, TrackingRow>(&format!(
            "SELECT {} FROM order_item_tracking t WHERE t.order_item_id = $1 AND t.company_id = $2",
            TRACKING_COLUMNS
        ))
        .bind(order_item_id)
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(OrderItemTracking::try_from).transpose()
    }

    async fn get_tracking(
        &self,
        company_id: Uuid,
        tracking_id: Uuid,
    ) -> AppResult<Option<OrderItemTracking>> {
        let row = sqlx::query_as::<_, TrackingRow>(&format!(
            "SELECT {} FROM order_item_tracking t WHERE t.id = $1 AND t.company_id = $2",
            TRACKING_COLUMNS
        ))
        .bind(tracking_id)
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(OrderItemTracking::try_from).transpose()
    }

    async fn list_tracking_for_order(
        &self,
        company_id: Uuid,
        order_id: Uuid,
    ) -> AppResult<Vec<OrderItemTracking>> {
        let rows = sqlx::query_as::<_, TrackingRow>(&format!(
            r#"
            SELECT {}
            FROM order_item_tracking t
            JOIN order_items i ON i.id = t.order_item_id
            WHERE i.order_id = $1 AND t.company_id = $2
            ORDER BY t.created_at
            "#,
            TRACKING_COLUMNS
        ))
        .bind(order_id)
        .bind(company_id)
        .fetch_all(&self.db)
        .await?;

        convert_all(rows)
    }

    async fn insert_tracking(
        &self,
        company_id: Uuid,
        tracking: &NewTracking,
    ) -> AppResult<OrderItemTracking> {
        let row = sqlx::query_as::<_, TrackingRow>(&format!(
            r#"
            INSERT INTO order_item_tracking AS t (
                company_id, order_item_id, quantity_target, quantity_from_stock,
                quantity_from_production, status
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            TRACKING_COLUMNS
        ))
        .bind(company_id)
        .bind(tracking.order_item_id)
        .bind(tracking.quantity_target)
        .bind(tracking.quantity_from_stock)
        .bind(tracking.quantity_from_production)
        .bind(tracking.status.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique(e, "Order item tracking"))?;

        OrderItemTracking::try_from(row)
    }

    async fn record_packaging_progress(
        &self,
        company_id: Uuid,
        tracking_id: Uuid,
        approved_total: Quantity,
    ) -> AppResult<OrderItemTracking> {
        let row = sqlx::query_as::<_, TrackingRow>(&format!(
            r#"
            UPDATE order_item_tracking AS t
            SET quantity_packaged_approved =
                    GREATEST(t.quantity_packaged_approved, LEAST(t.quantity_target, GREATEST($3, 0))),
                status = CASE
                    WHEN GREATEST(t.quantity_packaged_approved, LEAST(t.quantity_target, GREATEST($3, 0)))
                         >= t.quantity_target THEN 'ready_for_sale'
                    ELSE 'partially_ready'
                END,
                updated_at = NOW()
            WHERE t.id = $1 AND t.company_id = $2
            RETURNING {}
            "#,
            TRACKING_COLUMNS
        ))
        .bind(tracking_id)
        .bind(company_id)
        .bind(approved_total)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order item tracking".to_string()))?;

        OrderItemTracking::try_from(row)
    }

    async fn advance_tracking_status(
        &self,
        company_id: Uuid,
        tracking_id: Uuid,
        target: TrackingStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE order_item_tracking
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND company_id = $2 AND status = ANY($4)
            "#,
        )
        .bind(tracking_id)
        .bind(company_id)
        .bind(target.as_str())
        .bind(status_strings(target.predecessors(), TrackingStatus::as_str))
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_production_job(
        &self,
        company_id: Uuid,
        job: &NewProductionJob,
    ) -> AppResult<ProductionJob> {
        let row = sqlx::query_as::<_, ProductionRow>(&format!(
            r#"
            INSERT INTO production (company_id, product_id, tracking_id, order_id, quantity_requested, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING {}
            "#,
            PRODUCTION_COLUMNS
        ))
        .bind(company_id)
        .bind(job.product_id)
        .bind(job.tracking_id)
        .bind(job.order_id)
        .bind(job.quantity_requested)
        .fetch_one(&self.db)
        .await?;

        ProductionJob::try_from(row)
    }

    async fn get_production_job(&self, company_id: Uuid, job_id: Uuid) -> AppResult<Option<ProductionJob>> {
        let row = sqlx::query_as::<_, ProductionRow>(&format!(
            "SELECT {} FROM production WHERE id = $1 AND company_id = $2",
            PRODUCTION_COLUMNS
        ))
        .bind(job_id)
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(ProductionJob::try_from).transpose()
    }

    async fn list_production_jobs_for_tracking(
        &self,
        company_id: Uuid,
        tracking_id: Uuid,
    ) -> AppResult<Vec<ProductionJob>> {
        let rows = sqlx::query_as::<_, ProductionRow>(&format!(
            "SELECT {} FROM production WHERE tracking_id = $1 AND company_id = $2 ORDER BY created_at",
            PRODUCTION_COLUMNS
        ))
        .bind(tracking_id)
        .bind(company_id)
        .fetch_all(&self.db)
        .await?;

        convert_all(rows)
    }

    async fn update_production_job(
        &self,
        job: &ProductionJob,
        expected: ProductionStatus,
    ) -> AppResult<Option<ProductionJob>> {
        let row = sqlx::query_as::<_, ProductionRow>(&format!(
            r#"
            UPDATE production
            SET quantity_produced = $3, status = $4, started_by = $5, started_at = $6,
                completed_by = $7, completed_at = $8
            WHERE id = $1 AND company_id = $2 AND status = $9
            RETURNING {}
            "#,
            PRODUCTION_COLUMNS
        ))
        .bind(job.id)
        .bind(job.company_id)
        .bind(job.quantity_produced)
        .bind(job.status.as_str())
        .bind(job.started_by)
        .bind(job.started_at)
        .bind(job.completed_by)
        .bind(job.completed_at)
        .bind(expected.as_str())
        .fetch_optional(&self.db)
        .await?;

        row.map(ProductionJob::try_from).transpose()
    }

    async fn insert_packaging_job(
        &self,
        company_id: Uuid,
        job: &NewPackagingJob,
    ) -> AppResult<PackagingJob> {
        let row = sqlx::query_as::<_, PackagingRow>(&format!(
            r#"
            INSERT INTO packaging (
                company_id, product_id, tracking_id, order_id, client_id,
                quantity_to_package, status, origin
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7)
            RETURNING {}
            "#,
            PACKAGING_COLUMNS
        ))
        .bind(company_id)
        .bind(job.product_id)
        .bind(job.tracking_id)
        .bind(job.order_id)
        .bind(job.client_id)
        .bind(job.quantity_to_package)
        .bind(job.origin.as_str())
        .fetch_one(&self.db)
        .await?;

        PackagingJob::try_from(row)
    }

    async fn get_packaging_job(&self, company_id: Uuid, job_id: Uuid) -> AppResult<Option<PackagingJob>> {
        let row = sqlx::query_as::<_, PackagingRow>(&format!(
            "SELECT {} FROM packaging WHERE id = $1 AND company_id = $2",
            PACKAGING_COLUMNS
        ))
        .bind(job_id)
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(PackagingJob::try_from).transpose()
    }

    async fn list_packaging_jobs_for_tracking(
        &self,
        company_id: Uuid,
        tracking_id: Uuid,
    ) -> AppResult<Vec<PackagingJob>> {
        let rows = sqlx::query_as::<_, PackagingRow>(&format!(
            "SELECT {} FROM packaging WHERE tracking_id = $1 AND company_id = $2 ORDER BY created_at",
            PACKAGING_COLUMNS
        ))
        .bind(tracking_id)
        .bind(company_id)
        .fetch_all(&self.db)
        .await?;

        convert_all(rows)
    }

    async fn list_packaging_jobs(
        &self,
        company_id: Uuid,
        status: Option<PackagingStatus>,
        pagination: &Pagination,
    ) -> AppResult<Vec<PackagingJob>> {
        let rows = sqlx::query_as::<_, PackagingRow>(&format!(
            r#"
            SELECT {}
            FROM packaging
            WHERE company_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            PACKAGING_COLUMNS
        ))
        .bind(company_id)
        .bind(status.map(|s| s.as_str()))
        .bind(i64::from(pagination.per_page))
        .bind(i64::try_from(pagination.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.db)
        .await?;

        convert_all(rows)
    }

    async fn update_packaging_job(
        &self,
        job: &PackagingJob,
        expected: PackagingStatus,
    ) -> AppResult<Option<PackagingJob>> {
        let row = sqlx::query_as::<_, PackagingRow>(&format!(
            r#"
            UPDATE packaging
            SET quantity_packaged = $3, status = $4, quality_check = $5,
                packaged_by = $6, packaged_at = $7, approved_by = $8, approved_at = $9,
                updated_at = NOW()
            WHERE id = $1 AND company_id = $2 AND status = $10
            RETURNING {}
            "#,
            PACKAGING_COLUMNS
        ))
        .bind(job.id)
        .bind(job.company_id)
        .bind(job.quantity_packaged)
        .bind(job.status.as_str())
        .bind(job.quality_check)
        .bind(job.packaged_by)
        .bind(job.packaged_at)
        .bind(job.approved_by)
        .bind(job.approved_at)
        .bind(expected.as_str())
        .fetch_optional(&self.db)
        .await?;

        row.map(PackagingJob::try_from).transpose()
    }

    async fn get_sale(&self, company_id: Uuid, sale_id: Uuid) -> AppResult<Option<Sale>> {
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {} FROM sales WHERE id = $1 AND company_id = $2",
            SALE_COLUMNS
        ))
        .bind(sale_id)
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Sale::try_from).transpose()
    }

    async fn find_sale_for_order(&self, company_id: Uuid, order_id: Uuid) -> AppResult<Option<Sale>> {
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {} FROM sales WHERE order_id = $1 AND company_id = $2",
            SALE_COLUMNS
        ))
        .bind(order_id)
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Sale::try_from).transpose()
    }

    async fn next_sale_sequence(&self, company_id: Uuid, year: i32) -> AppResult<i64> {
        let (start, end) = year_bounds(year)?;
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM sales
            WHERE company_id = $1 AND created_at >= $2 AND created_at < $3
            "#,
        )
        .bind(company_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.db)
        .await?;

        Ok(count + 1)
    }

    async fn insert_sale(&self, company_id: Uuid, sale: &NewSale) -> AppResult<Sale> {
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            r#"
            INSERT INTO sales (
                company_id, order_id, sale_number, client_id, client_name, total_amount,
                payment_method, payment_term, status, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9)
            RETURNING {}
            "#,
            SALE_COLUMNS
        ))
        .bind(company_id)
        .bind(sale.order_id)
        .bind(&sale.sale_number)
        .bind(sale.client_id)
        .bind(&sale.client_name)
        .bind(sale.total_amount)
        .bind(&sale.payment_method)
        .bind(&sale.payment_term)
        .bind(sale.created_by)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique(e, "Sale"))?;

        Sale::try_from(row)
    }

    async fn confirm_sale(
        &self,
        company_id: Uuid,
        sale_id: Uuid,
        confirmed_by: Uuid,
        confirmed_at: DateTime<Utc>,
    ) -> AppResult<Sale> {
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            r#"
            UPDATE sales
            SET status = 'confirmed', confirmed_by = $3, confirmed_at = $4
            WHERE id = $1 AND company_id = $2 AND status = 'pending'
            RETURNING {}
            "#,
            SALE_COLUMNS
        ))
        .bind(sale_id)
        .bind(company_id)
        .bind(confirmed_by)
        .bind(confirmed_at)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Sale::try_from(row),
            None => self
                .get_sale(company_id, sale_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Sale".to_string())),
        }
    }

    async fn find_receivables(
        &self,
        company_id: Uuid,
        sale_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Vec<FinancialEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            SELECT {}
            FROM financial_entries
            WHERE company_id = $1 AND sale_id = $2 AND user_id = $3 AND entry_type = 'receivable'
            "#,
            ENTRY_COLUMNS
        ))
        .bind(company_id)
        .bind(sale_id)
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        convert_all(rows)
    }

    async fn insert_financial_entry(
        &self,
        company_id: Uuid,
        entry: &NewFinancialEntry,
    ) -> AppResult<FinancialEntry> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            INSERT INTO financial_entries (
                company_id, user_id, sale_id, entry_type, description, amount, due_date, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        ))
        .bind(company_id)
        .bind(entry.user_id)
        .bind(entry.sale_id)
        .bind(entry.entry_type.as_str())
        .bind(&entry.description)
        .bind(entry.amount)
        .bind(entry.due_date)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique(e, "Receivable"))?;

        FinancialEntry::try_from(row)
    }

    async fn list_financial_entries_for_sale(
        &self,
        company_id: Uuid,
        sale_id: Uuid,
    ) -> AppResult<Vec<FinancialEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {} FROM financial_entries WHERE company_id = $1 AND sale_id = $2 ORDER BY created_at",
            ENTRY_COLUMNS
        ))
        .bind(company_id)
        .bind(sale_id)
        .fetch_all(&self.db)
        .await?;

        convert_all(rows)
    }
}

/// UTC instants bounding a calendar year, end exclusive
fn year_bounds(year: i32) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let start_of = |y: i32| {
        NaiveDate::from_ymd_opt(y, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .ok_or_else(|| AppError::Internal(format!("year {} out of range", y)))
    };
    Ok((start_of(year)?, start_of(year + 1)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_year_bounds_are_utc() {
        let (start, end) = year_bounds(2024).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());

        let late = Utc.with_ymd_and_hms(2024, 12, 31, 23, 30, 0).unwrap();
        assert!(late >= start && late < end);
    }

    #[test]
    fn test_year_bounds_out_of_range() {
        assert!(matches!(year_bounds(i32::MAX), Err(AppError::Internal(_))));
    }
}
