use serde::{Deserialize, Serialize};

use super::{Customer, CustomerId, LedgerTransaction, Paise};

/// Compute a customer balance from the opening balance and its transactions.
/// Transactions are applied in sequence order regardless of the slice order.
/// Debits add, credits subtract.
pub fn replay_balance(opening_balance: Paise, transactions: &[LedgerTransaction]) -> Paise {
    let mut ordered: Vec<&LedgerTransaction> = transactions.iter().collect();
    ordered.sort_by_key(|t| t.sequence);
    ordered
        .into_iter()
        .fold(opening_balance, |balance, txn| {
            balance.saturating_add(txn.signed_amount())
        })
}

/// A customer whose cached balance disagrees with its transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDrift {
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub stored_balance: Paise,
    pub replayed_balance: Paise,
    pub transaction_count: usize,
}

impl BalanceDrift {
    /// How far the stored balance is ahead of the history (negative: behind).
    pub fn difference(&self) -> Paise {
        self.stored_balance - self.replayed_balance
    }
}

/// Check one customer's cached balance against its history.
pub fn verify_customer(
    customer: &Customer,
    transactions: &[LedgerTransaction],
) -> Option<BalanceDrift> {
    let replayed = replay_balance(customer.opening_balance, transactions);
    if replayed == customer.balance {
        return None;
    }
    Some(BalanceDrift {
        customer_id: customer.id,
        customer_name: customer.name.clone(),
        stored_balance: customer.balance,
        replayed_balance: replayed,
        transaction_count: transactions.len(),
    })
}

/// Result of checking every ledger of an owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub customer_count: usize,
    pub transaction_count: usize,
    pub invalid_amounts: usize,
    pub drifts: Vec<BalanceDrift>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.drifts.is_empty() && self.invalid_amounts == 0
    }
}

/// Build an integrity report from every customer and its transactions.
pub fn build_integrity_report(ledgers: &[(Customer, Vec<LedgerTransaction>)]) -> IntegrityReport {
    let mut report = IntegrityReport {
        customer_count: ledgers.len(),
        ..Default::default()
    };

    for (customer, transactions) in ledgers {
        report.transaction_count += transactions.len();
        report.invalid_amounts += transactions.iter().filter(|t| t.amount <= 0).count();
        if let Some(drift) = verify_customer(customer, transactions) {
            report.drifts.push(drift);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::domain::TransactionType;

    fn make_txn(customer: &Customer, sequence: i64, amount: Paise, kind: TransactionType) -> LedgerTransaction {
        let mut txn = LedgerTransaction::new(customer.id, customer.owner_id, amount, kind, Utc::now());
        txn.sequence = sequence;
        txn
    }

    fn customer(opening: Paise) -> Customer {
        Customer::new(Uuid::new_v4(), "Sneha".into(), "90000".into(), opening)
    }

    #[test]
    fn test_replay_empty_history_is_opening_balance() {
        assert_eq!(replay_balance(-2500, &[]), -2500);
    }

    #[test]
    fn test_replay_debit_adds_credit_subtracts() {
        let c = customer(0);
        let txns = vec![
            make_txn(&c, 1, 120000, TransactionType::Credit), // -1200
            make_txn(&c, 2, 50000, TransactionType::Debit),   // +500
            make_txn(&c, 3, 10000, TransactionType::Credit),  // -100
        ];
        assert_eq!(replay_balance(c.opening_balance, &txns), -80000);
    }

    #[test]
    fn test_replay_ignores_slice_order() {
        let c = customer(30000);
        let newest_first = vec![
            make_txn(&c, 2, 10000, TransactionType::Debit),
            make_txn(&c, 1, 5000, TransactionType::Credit),
        ];
        assert_eq!(replay_balance(c.opening_balance, &newest_first), 35000);
    }

    #[test]
    fn test_verify_consistent_customer() {
        let mut c = customer(-50000);
        let txns = vec![make_txn(&c, 1, 50000, TransactionType::Debit)];
        c.balance = 0;
        assert!(verify_customer(&c, &txns).is_none());
    }

    #[test]
    fn test_verify_detects_lagging_balance() {
        let c = customer(0);
        // Transaction persisted but the balance never moved
        let txns = vec![make_txn(&c, 1, 10000, TransactionType::Debit)];
        let drift = verify_customer(&c, &txns).expect("drift");
        assert_eq!(drift.stored_balance, 0);
        assert_eq!(drift.replayed_balance, 10000);
        assert_eq!(drift.difference(), -10000);
    }

    #[test]
    fn test_integrity_report() {
        let healthy = customer(1000);
        let mut drifting = customer(0);
        let drifting_txns = vec![
            make_txn(&drifting, 1, 10000, TransactionType::Debit),
            make_txn(&drifting, 2, 5000, TransactionType::Credit),
        ];
        // Lost update: only the credit's balance survived
        drifting.balance = -5000;

        let report = build_integrity_report(&[
            (healthy, vec![]),
            (drifting.clone(), drifting_txns),
        ]);

        assert_eq!(report.customer_count, 2);
        assert_eq!(report.transaction_count, 2);
        assert!(!report.is_healthy());
        assert_eq!(report.drifts.len(), 1);
        assert_eq!(report.drifts[0].customer_id, drifting.id);
        assert_eq!(report.drifts[0].replayed_balance, 5000);
    }
}
