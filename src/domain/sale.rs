use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OwnerId, Paise};

pub type SaleId = Uuid;

/// One line of a counter sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    pub name: String,
    pub quantity: i64,
    pub unit_price: Paise,
}

impl SaleItem {
    pub fn new(name: impl Into<String>, quantity: i64, unit_price: Paise) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit_price,
        }
    }

    /// `quantity * unit_price`, or `None` on overflow.
    pub fn line_total(&self) -> Option<Paise> {
        self.quantity.checked_mul(self.unit_price)
    }
}

/// Sum of the line totals, or `None` on overflow.
pub fn sale_amount(items: &[SaleItem]) -> Option<Paise> {
    items
        .iter()
        .try_fold(0 as Paise, |acc, item| acc.checked_add(item.line_total()?))
}

/// A completed sale. `amount` is what the customer paid, `cost` what the
/// goods cost the business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub owner_id: OwnerId,
    pub date: NaiveDate,
    pub amount: Paise,
    pub cost: Paise,
    pub items: Vec<SaleItem>,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    pub fn new(
        owner_id: OwnerId,
        date: NaiveDate,
        items: Vec<SaleItem>,
        amount: Paise,
        cost: Paise,
    ) -> Self {
        assert!(amount > 0, "Sale amount must be positive");
        assert!(cost >= 0, "Sale cost cannot be negative");
        Self {
            id: Uuid::new_v4(),
            owner_id,
            date,
            amount,
            cost,
            items,
            created_at: Utc::now(),
        }
    }

    /// Negative when goods were sold below cost.
    pub fn profit(&self) -> Paise {
        self.amount - self.cost
    }
}

/// Revenue and profit of every sale on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub sale_count: i64,
    pub revenue: Paise,
    pub profit: Paise,
}
