mod database;
mod ledger_store;
mod repository;

pub use database::*;
pub use ledger_store::*;
pub use repository::*;

/// SQL migration for owners, customers and the customer ledger
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// SQL migration for inventory and expenses
pub const MIGRATION_002_INVENTORY_EXPENSES: &str =
    include_str!("migrations/002_inventory_expenses.sql");

/// SQL migration for counter sales
pub const MIGRATION_003_SALES: &str = include_str!("migrations/003_sales.sql");
