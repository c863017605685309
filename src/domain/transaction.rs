use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CustomerId, OwnerId, Paise};

pub type TransactionId = Uuid;

/// Direction of a ledger transaction.
///
/// The naming follows the shop's point of view rather than accounting
/// convention: a `Debit` is money the customer paid in (balance goes up),
/// a `Credit` is goods taken on account (balance goes down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// "Customer Paid"
    Debit,
    /// "Customer Bought"
    Credit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Debit => "debit",
            TransactionType::Credit => "credit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "debit" => Some(TransactionType::Debit),
            "credit" => Some(TransactionType::Credit),
            _ => None,
        }
    }

    /// Label of the action that records this kind of transaction.
    pub fn action_label(&self) -> &'static str {
        match self {
            TransactionType::Debit => "Customer Paid",
            TransactionType::Credit => "Customer Bought",
        }
    }

    /// Label shown for this kind of transaction in a customer's history.
    pub fn history_label(&self) -> &'static str {
        match self {
            TransactionType::Debit => "Payment Received",
            TransactionType::Credit => "Credit Sale",
        }
    }

    /// Signed effect of `amount` on a customer balance.
    pub fn signed(&self, amount: Paise) -> Paise {
        match self {
            TransactionType::Debit => amount,
            TransactionType::Credit => -amount,
        }
    }

    /// Apply `amount` to `balance`. Returns `None` on overflow.
    pub fn apply(&self, balance: Paise, amount: Paise) -> Option<Paise> {
        match self {
            TransactionType::Debit => balance.checked_add(amount),
            TransactionType::Credit => balance.checked_sub(amount),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable ledger entry against one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: TransactionId,
    /// Store-assigned, strictly increasing creation order
    pub sequence: i64,
    pub customer_id: CustomerId,
    pub owner_id: OwnerId,
    /// Magnitude in paise (always positive)
    pub amount: Paise,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    /// Create a new transaction. Sequence number must be assigned by the store.
    pub fn new(
        customer_id: CustomerId,
        owner_id: OwnerId,
        amount: Paise,
        kind: TransactionType,
        created_at: DateTime<Utc>,
    ) -> Self {
        assert!(amount > 0, "Transaction amount must be positive");
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            customer_id,
            owner_id,
            amount,
            kind,
            notes: None,
            created_at,
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn signed_amount(&self) -> Paise {
        self.kind.signed(self.amount)
    }
}
