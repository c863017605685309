use thiserror::Error;

use crate::domain::{CustomerId, InvoiceError, OwnerId, Paise, TransactionId};
use crate::storage::WriteStage;

#[derive(Error, Debug)]
pub enum AppError {
    /// Rejected input; nothing was written.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Customer name '{name}' matches {count} customers; use the customer ID")]
    AmbiguousCustomer { name: String, count: usize },

    #[error("Inventory item not found: {0}")]
    ItemNotFound(String),

    #[error("Expense not found: {0}")]
    ExpenseNotFound(String),

    #[error("Business profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Business profile already exists: {0}")]
    ProfileAlreadyExists(String),

    #[error("Customer {customer_id} belongs to owner {customer_owner}, not {owner}")]
    OwnerMismatch {
        customer_id: CustomerId,
        customer_owner: OwnerId,
        owner: OwnerId,
    },

    /// The store rejected the payment and nothing was persisted.
    #[error("Payment not recorded ({stage} failed), safe to retry: {source}")]
    WriteFailed {
        stage: WriteStage,
        #[source]
        source: anyhow::Error,
    },

    /// The transaction row exists but the customer balance was not updated.
    #[error(
        "Ledger inconsistent for customer {customer_id}: transaction {transaction_id} recorded \
         but balance not updated to {expected_balance}: {source}"
    )]
    InconsistentState {
        customer_id: CustomerId,
        transaction_id: TransactionId,
        expected_balance: Paise,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid invoice: {0}")]
    Invoice(#[from] InvoiceError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::Invoice(_))
    }

    /// Whether repeating the same request cannot double-apply anything.
    pub fn is_retry_safe(&self) -> bool {
        matches!(self, AppError::WriteFailed { .. })
    }
}
