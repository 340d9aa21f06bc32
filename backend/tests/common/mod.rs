//! Shared fixtures for the fulfillment integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use fulfillment_backend::config::FulfillmentConfig;
use fulfillment_backend::services::{
    AllocationService, PackagingService, ProductionService, SalesService,
};
use fulfillment_backend::{FulfillmentStore, InMemoryStore};
use shared::{Order, OrderItem, OrderStatus, Product, Quantity};

/// One company's worth of in-memory data plus the services over it
pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub company_id: Uuid,
    pub actor: Uuid,
    orders_created: std::sync::atomic::AtomicI64,
}

/// Product kinds the allocator distinguishes
#[derive(Debug, Clone, Copy)]
pub enum Kind {
    DirectSale,
    Manufactured,
    Stocked,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            company_id: Uuid::new_v4(),
            actor: Uuid::new_v4(),
            orders_created: std::sync::atomic::AtomicI64::new(0),
        }
    }

    pub fn dyn_store(&self) -> Arc<dyn FulfillmentStore> {
        self.store.clone()
    }

    pub fn allocation(&self) -> AllocationService {
        AllocationService::new(self.dyn_store(), &FulfillmentConfig::default())
    }

    pub fn packaging(&self) -> PackagingService {
        PackagingService::new(self.dyn_store())
    }

    pub fn production(&self) -> ProductionService {
        ProductionService::new(self.dyn_store())
    }

    pub fn sales(&self) -> SalesService {
        SalesService::new(self.dyn_store(), &FulfillmentConfig::default())
    }

    pub fn product(&self, kind: Kind, stock_quantity: Quantity) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .put_product(Product {
                id,
                company_id: self.company_id,
                name: format!("{:?} product", kind),
                stock_quantity,
                is_direct_sale: matches!(kind, Kind::DirectSale),
                is_manufactured: matches!(kind, Kind::Manufactured),
            })
            .unwrap();
        id
    }

    /// Create a pending order with one line per `(product, quantity)`.
    /// Returns the order id and the line item ids in order.
    pub fn order(&self, lines: &[(Uuid, Quantity)]) -> (Uuid, Vec<Uuid>) {
        self.order_with_term(lines, Some("30 dias"))
    }

    pub fn order_with_term(&self, lines: &[(Uuid, Quantity)], payment_term: Option<&str>) -> (Uuid, Vec<Uuid>) {
        let n = self
            .orders_created
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let order_id = Uuid::new_v4();
        let created_at = Utc::now() + Duration::milliseconds(n);

        self.store
            .put_order(Order {
                id: order_id,
                company_id: self.company_id,
                order_number: format!("PED-{:04}", n + 1),
                client_id: Some(Uuid::new_v4()),
                client_name: "Mercado Central".to_string(),
                status: OrderStatus::Pending,
                total_amount: Decimal::new(150_000, 2),
                payment_method: Some("boleto".to_string()),
                payment_term: payment_term.map(str::to_string),
                created_at,
                updated_at: created_at,
            })
            .unwrap();

        let item_ids = lines
            .iter()
            .map(|&(product_id, quantity)| {
                let id = Uuid::new_v4();
                self.store
                    .put_order_item(OrderItem {
                        id,
                        order_id,
                        product_id,
                        quantity,
                        unit_price: Decimal::new(1_000, 2),
                    })
                    .unwrap();
                id
            })
            .collect();

        (order_id, item_ids)
    }

    pub async fn order_status(&self, order_id: Uuid) -> OrderStatus {
        self.store
            .get_order(self.company_id, order_id)
            .await
            .unwrap()
            .expect("order exists")
            .status
    }
}
