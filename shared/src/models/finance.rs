//! Financial entry and payment term models

use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ParseStatusError;

/// Payment term applied when none can be read from the sale
pub const DEFAULT_PAYMENT_TERM_DAYS: u32 = 30;

/// Longest payment term accepted from free text, in days
pub const MAX_PAYMENT_TERM_DAYS: u32 = 3650;

/// A receivable or payable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialEntry {
    pub id: Uuid,
    pub company_id: Uuid,
    /// User that raised the entry; part of the receivable uniqueness key
    pub user_id: Uuid,
    pub sale_id: Option<Uuid>,
    pub entry_type: EntryType,
    pub description: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a financial entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFinancialEntry {
    pub user_id: Uuid,
    pub sale_id: Option<Uuid>,
    pub entry_type: EntryType,
    pub description: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Receivable,
    Payable,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Receivable => "receivable",
            EntryType::Payable => "payable",
        }
    }
}

impl std::str::FromStr for EntryType {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receivable" => Ok(EntryType::Receivable),
            "payable" => Ok(EntryType::Payable),
            other => Err(ParseStatusError::new("entry type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Paid,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Paid => "paid",
        }
    }
}

impl std::str::FromStr for EntryStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EntryStatus::Pending),
            "paid" => Ok(EntryStatus::Paid),
            other => Err(ParseStatusError::new("entry", other)),
        }
    }
}

/// Description written on the receivable raised by a confirmed sale
pub fn receivable_description(sale_number: &str, client_name: &str) -> String {
    format!("Venda confirmada - {} - {}", sale_number, client_name)
}

/// Unit of a payment term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermUnit {
    Days,
    Weeks,
    Months,
}

/// Structured payment term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTerm {
    pub count: u32,
    pub unit: TermUnit,
}

impl Default for PaymentTerm {
    fn default() -> Self {
        Self::days(DEFAULT_PAYMENT_TERM_DAYS)
    }
}

impl PaymentTerm {
    pub fn days(count: u32) -> Self {
        Self {
            count,
            unit: TermUnit::Days,
        }
    }

    /// Read a term from free text such as "30 dias" or "45 DDL".
    ///
    /// The first run of ASCII digits is the number of days; any unit words
    /// in the text are ignored. Returns `None` when there is no number or it
    /// is out of range, so the caller can decide on the fallback.
    pub fn parse_free_text(text: Option<&str>) -> Option<Self> {
        let text = text?;
        let digits: String = text
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();

        let count = digits.parse::<u32>().ok()?;
        if count > MAX_PAYMENT_TERM_DAYS {
            return None;
        }
        Some(Self::days(count))
    }

    /// Due date for a document issued on `issued_on`
    pub fn due_date(&self, issued_on: NaiveDate) -> NaiveDate {
        let due = match self.unit {
            TermUnit::Days => issued_on.checked_add_days(Days::new(u64::from(self.count))),
            TermUnit::Weeks => issued_on.checked_add_days(Days::new(u64::from(self.count) * 7)),
            TermUnit::Months => issued_on.checked_add_months(Months::new(self.count)),
        };
        due.unwrap_or(NaiveDate::MAX)
    }
}
