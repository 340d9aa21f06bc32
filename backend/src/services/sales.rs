//! Sales service
//!
//! Raises sales from released orders and approves them. Approval creates the
//! sale's receivable before confirming the sale, and is safe to retry: at
//! most one receivable exists per sale and approving user.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::FulfillmentConfig;
use crate::error::{AppError, AppResult};
use crate::store::FulfillmentStore;
use shared::{
    generate_sale_number, receivable_description, validate_payment_term_text, EntryType,
    FinancialEntry, NewFinancialEntry, NewSale, OrderStatus, PaymentTerm, Sale, SaleStatus,
};

/// Attempts at picking a free sale number before giving up
const SALE_NUMBER_ATTEMPTS: usize = 3;

/// Sales service
#[derive(Clone)]
pub struct SalesService {
    store: Arc<dyn FulfillmentStore>,
    default_term_days: u32,
}

/// Result of raising a sale for an order
#[derive(Debug, Clone, Serialize)]
pub struct SaleCreation {
    pub sale: Sale,
    /// `false` when the order already had a sale
    pub created: bool,
}

/// Result of approving a sale
#[derive(Debug, Clone, Serialize)]
pub struct SaleApproval {
    pub sale: Sale,
    pub receivable: Option<FinancialEntry>,
    /// `true` only for the call that inserted the receivable
    pub receivable_created: bool,
}

impl SalesService {
    pub fn new(store: Arc<dyn FulfillmentStore>, config: &FulfillmentConfig) -> Self {
        Self {
            store,
            default_term_days: config.default_payment_term_days,
        }
    }

    pub async fn get_sale(&self, company_id: Uuid, sale_id: Uuid) -> AppResult<Sale> {
        self.store
            .get_sale(company_id, sale_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Sale".to_string()))
    }

    pub async fn list_financial_entries(
        &self,
        company_id: Uuid,
        sale_id: Uuid,
    ) -> AppResult<Vec<FinancialEntry>> {
        let sale = self.get_sale(company_id, sale_id).await?;
        self.store
            .list_financial_entries_for_sale(company_id, sale.id)
            .await
    }

    /// Raise a sale for an order released for sale. Returns the existing
    /// sale if the order already has one.
    #[tracing::instrument(skip(self))]
    pub async fn create_sale_for_order(
        &self,
        company_id: Uuid,
        actor: Uuid,
        order_id: Uuid,
    ) -> AppResult<SaleCreation> {
        if let Some(sale) = self.store.find_sale_for_order(company_id, order_id).await? {
            return Ok(SaleCreation {
                sale,
                created: false,
            });
        }

        let order = self
            .store
            .get_order(company_id, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        if order.status != OrderStatus::ReleasedForSale {
            return Err(AppError::InvalidStateTransition(format!(
                "Order {} is {}, not released for sale",
                order.order_number, order.status
            )));
        }

        if let Some(term) = order.payment_term.as_deref() {
            validate_payment_term_text(term).map_err(|msg| AppError::invalid("payment_term", msg))?;
        }

        let year = Utc::now().year();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let sequence = self.store.next_sale_sequence(company_id, year).await?;
            let new_sale = NewSale {
                order_id: Some(order.id),
                sale_number: generate_sale_number(year, sequence),
                client_id: order.client_id,
                client_name: order.client_name.clone(),
                total_amount: order.total_amount,
                payment_method: order.payment_method.clone(),
                payment_term: order.payment_term.clone(),
                created_by: Some(actor),
            };

            match self.store.insert_sale(company_id, &new_sale).await {
                Ok(sale) => {
                    info!(sale_id = %sale.id, sale_number = %sale.sale_number, "Sale created");
                    return Ok(SaleCreation {
                        sale,
                        created: true,
                    });
                }
                Err(e) if e.is_duplicate() => {
                    // Either the order got its sale concurrently or the number was taken.
                    if let Some(sale) = self.store.find_sale_for_order(company_id, order_id).await? {
                        return Ok(SaleCreation {
                            sale,
                            created: false,
                        });
                    }
                    if attempt >= SALE_NUMBER_ATTEMPTS {
                        return Err(e);
                    }
                    warn!(sale_number = %new_sale.sale_number, "Sale number taken, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Approve a sale: raise its receivable, then confirm it.
    #[tracing::instrument(skip(self))]
    pub async fn approve_sale(
        &self,
        company_id: Uuid,
        actor: Uuid,
        sale_id: Uuid,
    ) -> AppResult<SaleApproval> {
        let sale = self.get_sale(company_id, sale_id).await?;

        if sale.status == SaleStatus::Cancelled {
            return Err(AppError::InvalidStateTransition(format!(
                "Sale {} is cancelled",
                sale.sale_number
            )));
        }

        let existing = self.store.find_receivables(company_id, sale.id, actor).await?;

        let (receivable, receivable_created) = if let Some(entry) = existing.into_iter().next() {
            info!(sale_id = %sale.id, "Receivable already exists, confirming only");
            (Some(entry), false)
        } else {
            self.create_receivable(company_id, actor, &sale).await?
        };

        let sale = if sale.status == SaleStatus::Confirmed {
            sale
        } else {
            self.store
                .confirm_sale(company_id, sale.id, actor, Utc::now())
                .await?
        };

        info!(
            sale_id = %sale.id,
            sale_number = %sale.sale_number,
            receivable_created,
            "Sale approved"
        );

        Ok(SaleApproval {
            sale,
            receivable,
            receivable_created,
        })
    }

    async fn create_receivable(
        &self,
        company_id: Uuid,
        actor: Uuid,
        sale: &Sale,
    ) -> AppResult<(Option<FinancialEntry>, bool)> {
        let term = self.payment_term(sale);
        let entry = NewFinancialEntry {
            user_id: actor,
            sale_id: Some(sale.id),
            entry_type: EntryType::Receivable,
            description: receivable_description(&sale.sale_number, &sale.client_name),
            amount: sale.total_amount,
            due_date: term.due_date(Utc::now().date_naive()),
        };

        match self.store.insert_financial_entry(company_id, &entry).await {
            Ok(created) => Ok((Some(created), true)),
            Err(e) if e.is_duplicate() => {
                warn!(sale_id = %sale.id, "Receivable was created by a concurrent approval");
                let existing = self.store.find_receivables(company_id, sale.id, actor).await?;
                Ok((existing.into_iter().next(), false))
            }
            Err(e) => {
                error!(sale_id = %sale.id, "Failed to create receivable, sale left unconfirmed: {}", e);
                Err(e)
            }
        }
    }

    /// The one place free-text payment terms are read.
    fn payment_term(&self, sale: &Sale) -> PaymentTerm {
        PaymentTerm::parse_free_text(sale.payment_term.as_deref()).unwrap_or_else(|| {
            warn!(
                sale_id = %sale.id,
                payment_term = ?sale.payment_term,
                default_days = self.default_term_days,
                "Payment term unreadable, using default"
            );
            PaymentTerm::days(self.default_term_days)
        })
    }
}
