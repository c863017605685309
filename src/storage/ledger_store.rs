use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{CustomerId, LedgerTransaction, OwnerId, Paise};

/// The write that failed while recording a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    TransactionInsert,
    BalanceUpdate,
    Commit,
}

impl std::fmt::Display for WriteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WriteStage::TransactionInsert => "transaction insert",
            WriteStage::BalanceUpdate => "balance update",
            WriteStage::Commit => "commit",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Error)]
pub enum PaymentWriteError {
    /// Nothing was persisted; the payment can be retried as a whole.
    #[error("payment not recorded ({stage} failed): {source}")]
    NotApplied {
        stage: WriteStage,
        #[source]
        source: anyhow::Error,
    },

    /// The transaction row exists but the customer balance was not updated.
    #[error("transaction recorded but balance update failed: {0}")]
    BalanceLagging(#[source] anyhow::Error),
}

/// Row store behind the reconciler, scoped to a single owner.
///
/// `commit_payment` defaults to the two dependent writes in order and
/// reports which one failed. Stores that can apply both writes in one
/// unit of work should override it.
pub trait LedgerStore: Send + Sync {
    fn owner_id(&self) -> OwnerId;

    /// Append a transaction row, assigning its sequence number.
    fn insert_transaction(
        &self,
        txn: &mut LedgerTransaction,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Write the cached balance and last transaction time of a customer.
    fn update_balance(
        &self,
        customer_id: CustomerId,
        balance: Paise,
        at: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Transactions of a customer, newest first.
    fn transactions_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> impl Future<Output = anyhow::Result<Vec<LedgerTransaction>>> + Send;

    fn commit_payment(
        &self,
        txn: &mut LedgerTransaction,
        new_balance: Paise,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), PaymentWriteError>> + Send {
        async move {
            self.insert_transaction(txn)
                .await
                .map_err(|source| PaymentWriteError::NotApplied {
                    stage: WriteStage::TransactionInsert,
                    source,
                })?;
            self.update_balance(txn.customer_id, new_balance, at)
                .await
                .map_err(PaymentWriteError::BalanceLagging)
        }
    }
}
