use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::{
    BalanceStatus, Customer, CustomerId, LedgerTransaction, Paise, TransactionType,
    replay_balance,
};
use crate::storage::{LedgerStore, PaymentWriteError};

use super::{AppError, Change, ChangeFeed, EntityKind};

/// Outcome of a recorded payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentReceipt {
    pub transaction: LedgerTransaction,
    pub previous_balance: Paise,
    pub new_balance: Paise,
    pub status: BalanceStatus,
}

/// Records payment events against customers and keeps each customer's
/// cached balance in step with its transaction history.
///
/// The new balance is computed from the customer snapshot handed in. Two
/// payments computed from the same snapshot both append their transaction,
/// but the cached balance keeps only the later write.
#[derive(Debug, Clone)]
pub struct Reconciler<S> {
    store: S,
    feed: ChangeFeed,
}

impl<S: LedgerStore> Reconciler<S> {
    pub fn new(store: S, feed: ChangeFeed) -> Self {
        Self { store, feed }
    }

    /// Record a payment event and move the customer balance.
    ///
    /// `Debit` (customer paid) adds `amount`, `Credit` (customer bought on
    /// account) subtracts it. The transaction row and the balance are written
    /// together; see [`AppError::WriteFailed`] and
    /// [`AppError::InconsistentState`] for the two failure outcomes.
    pub async fn record_payment(
        &self,
        customer: &Customer,
        amount: Paise,
        kind: TransactionType,
        notes: Option<String>,
    ) -> Result<PaymentReceipt, AppError> {
        if amount <= 0 {
            return Err(AppError::validation(format!(
                "amount must be greater than zero, got {}",
                amount
            )));
        }
        self.check_owner(customer)?;

        let new_balance = kind.apply(customer.balance, amount).ok_or_else(|| {
            AppError::validation(format!(
                "amount {} overflows the balance of customer {}",
                amount, customer.name
            ))
        })?;

        let now = Utc::now();
        let mut txn = LedgerTransaction::new(customer.id, customer.owner_id, amount, kind, now)
            .with_notes(notes);

        match self.store.commit_payment(&mut txn, new_balance, now).await {
            Ok(()) => {
                info!(
                    customer_id = %customer.id,
                    transaction_id = %txn.id,
                    sequence = txn.sequence,
                    kind = %kind,
                    amount,
                    new_balance,
                    "payment recorded"
                );
                self.publish_ledger_change(customer.id);
                Ok(PaymentReceipt {
                    previous_balance: customer.balance,
                    new_balance,
                    status: BalanceStatus::of(new_balance),
                    transaction: txn,
                })
            }
            Err(PaymentWriteError::NotApplied { stage, source }) => {
                warn!(
                    customer_id = %customer.id,
                    %stage,
                    error = %source,
                    "payment not recorded"
                );
                Err(AppError::WriteFailed { stage, source })
            }
            Err(PaymentWriteError::BalanceLagging(source)) => {
                error!(
                    customer_id = %customer.id,
                    transaction_id = %txn.id,
                    expected_balance = new_balance,
                    error = %source,
                    "transaction recorded but balance update failed"
                );
                // The row is visible, so history readers must refresh
                self.feed.publish(Change::scoped(
                    EntityKind::Transactions,
                    customer.owner_id,
                    customer.id,
                ));
                Err(AppError::InconsistentState {
                    customer_id: customer.id,
                    transaction_id: txn.id,
                    expected_balance: new_balance,
                    source,
                })
            }
        }
    }

    /// Transactions of a customer, newest first.
    pub async fn history(&self, customer_id: CustomerId) -> Result<Vec<LedgerTransaction>, AppError> {
        let transactions = self.store.transactions_for_customer(customer_id).await?;
        debug!(%customer_id, count = transactions.len(), "history loaded");
        Ok(transactions)
    }

    /// Re-apply only the balance write of a payment that ended in
    /// [`AppError::InconsistentState`].
    pub async fn retry_balance_update(
        &self,
        customer_id: CustomerId,
        expected_balance: Paise,
    ) -> Result<(), AppError> {
        let history = self.store.transactions_for_customer(customer_id).await?;
        let at = history.first().map(|t| t.created_at).unwrap_or_else(Utc::now);

        self.store
            .update_balance(customer_id, expected_balance, at)
            .await?;

        info!(%customer_id, balance = expected_balance, "balance update retried");
        self.publish_ledger_change(customer_id);
        Ok(())
    }

    /// Recompute a customer balance from its opening balance and full history
    /// and store it. Returns the rebuilt balance.
    pub async fn rebuild_balance(&self, customer: &Customer) -> Result<Paise, AppError> {
        self.check_owner(customer)?;

        let history = self.store.transactions_for_customer(customer.id).await?;
        let rebuilt = replay_balance(customer.opening_balance, &history);
        if rebuilt == customer.balance {
            debug!(customer_id = %customer.id, balance = rebuilt, "balance already consistent");
            return Ok(rebuilt);
        }

        let at: DateTime<Utc> = history
            .first()
            .map(|t| t.created_at)
            .or(customer.last_transaction)
            .unwrap_or(customer.created_at);
        self.store.update_balance(customer.id, rebuilt, at).await?;

        warn!(
            customer_id = %customer.id,
            stored = customer.balance,
            rebuilt,
            "balance rebuilt from history"
        );
        self.publish_ledger_change(customer.id);
        Ok(rebuilt)
    }

    fn check_owner(&self, customer: &Customer) -> Result<(), AppError> {
        let owner = self.store.owner_id();
        if customer.owner_id != owner {
            return Err(AppError::OwnerMismatch {
                customer_id: customer.id,
                customer_owner: customer.owner_id,
                owner,
            });
        }
        Ok(())
    }

    fn publish_ledger_change(&self, customer_id: CustomerId) {
        let owner = self.store.owner_id();
        self.feed
            .publish(Change::scoped(EntityKind::Customers, owner, customer_id));
        self.feed
            .publish(Change::scoped(EntityKind::Transactions, owner, customer_id));
    }
}

impl<S: LedgerStore + Clone + 'static> Reconciler<S> {
    /// Record a payment on the runtime. The write completes even if the
    /// returned handle is dropped.
    pub fn spawn_record_payment(
        &self,
        customer: Customer,
        amount: Paise,
        kind: TransactionType,
        notes: Option<String>,
    ) -> JoinHandle<Result<PaymentReceipt, AppError>> {
        let reconciler = self.clone();
        tokio::spawn(async move {
            reconciler
                .record_payment(&customer, amount, kind, notes)
                .await
        })
    }
}
