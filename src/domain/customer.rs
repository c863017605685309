use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OwnerId, Paise};

pub type CustomerId = Uuid;

/// Display classification of a customer balance. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStatus {
    /// Negative balance: the customer owes the business
    Owed,
    /// Zero balance
    Settled,
    /// Positive balance: the customer holds prepaid credit
    CreditHeld,
}

impl BalanceStatus {
    pub fn of(balance: Paise) -> Self {
        match balance {
            b if b < 0 => BalanceStatus::Owed,
            0 => BalanceStatus::Settled,
            _ => BalanceStatus::CreditHeld,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BalanceStatus::Owed => "owed to business",
            BalanceStatus::Settled => "settled",
            BalanceStatus::CreditHeld => "credit held",
        }
    }

    /// Compact label used in tables and reports.
    pub fn short_label(&self) -> &'static str {
        match self {
            BalanceStatus::Owed => "Due",
            BalanceStatus::Settled => "Settled",
            BalanceStatus::CreditHeld => "Advance",
        }
    }
}

impl std::fmt::Display for BalanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A customer with a running credit balance.
///
/// `balance` is a cache of `opening_balance` folded with every ledger
/// transaction of the customer; only the reconciler writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub owner_id: OwnerId,
    pub name: String,
    pub phone: String,
    pub opening_balance: Paise,
    pub balance: Paise,
    pub last_transaction: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(owner_id: OwnerId, name: String, phone: String, opening_balance: Paise) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name,
            phone,
            opening_balance,
            balance: opening_balance,
            last_transaction: None,
            created_at: Utc::now(),
        }
    }

    pub fn status(&self) -> BalanceStatus {
        BalanceStatus::of(self.balance)
    }
}
