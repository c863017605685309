// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use khata::application::BusinessService;
use khata::domain::{Customer, CustomerId, LedgerTransaction, OwnerId, Paise};
use khata::storage::{Database, LedgerStore, OwnerRepository};
use tempfile::TempDir;

pub const BUSINESS: &str = "Sharma Kirana";
pub const GSTIN: &str = "29ABCDE1234F1Z5";

/// Helper to create a migrated database in a temporary directory
pub async fn test_database() -> Result<(Database, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db = BusinessService::init_database(db_path.to_str().unwrap()).await?;
    Ok((db, temp_dir))
}

/// Helper to create a test service for a fresh business
pub async fn test_service() -> Result<(BusinessService, TempDir)> {
    let (db, temp_dir) = test_database().await?;
    let service = BusinessService::create(db, BUSINESS, Some(GSTIN.into())).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Test fixture: customers in each balance state
pub struct StandardCustomers {
    /// Owes ₹500
    pub rajesh: Customer,
    /// Settled
    pub priya: Customer,
    /// Holds ₹300 of credit
    pub amit: Customer,
}

impl StandardCustomers {
    pub async fn create(service: &BusinessService) -> Result<Self> {
        Ok(Self {
            rajesh: service
                .add_customer("Rajesh Kumar", "9845012345", -50000)
                .await?,
            priya: service.add_customer("Priya Sharma", "9845054321", 0).await?,
            amit: service.add_customer("Amit Patel", "9845099999", 30000).await?,
        })
    }
}

/// Store that runs the payment writes as two separate steps and can be told
/// to fail either of them.
#[derive(Clone)]
pub struct FlakyStore {
    inner: OwnerRepository,
    fail_insert: Arc<AtomicBool>,
    fail_balance: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn new(inner: OwnerRepository) -> Self {
        Self {
            inner,
            fail_insert: Arc::new(AtomicBool::new(false)),
            fail_balance: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_insert(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }

    pub fn fail_balance(&self, fail: bool) {
        self.fail_balance.store(fail, Ordering::SeqCst);
    }
}

impl LedgerStore for FlakyStore {
    fn owner_id(&self) -> OwnerId {
        LedgerStore::owner_id(&self.inner)
    }

    async fn insert_transaction(&self, txn: &mut LedgerTransaction) -> Result<()> {
        if self.fail_insert.load(Ordering::SeqCst) {
            anyhow::bail!("simulated insert failure");
        }
        self.inner.insert_transaction(txn).await
    }

    async fn update_balance(
        &self,
        customer_id: CustomerId,
        balance: Paise,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if self.fail_balance.load(Ordering::SeqCst) {
            anyhow::bail!("simulated balance failure");
        }
        self.inner.update_balance(customer_id, balance, at).await
    }

    async fn transactions_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<LedgerTransaction>> {
        self.inner.transactions_for_customer(customer_id).await
    }
}
