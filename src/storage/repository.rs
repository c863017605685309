use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Customer, CustomerId, DailySales, Expense, ExpenseCategory, ExpenseId, InventoryItem, ItemId,
    LedgerTransaction, OwnerId, Paise, Sale, TransactionType,
};

use super::{LedgerStore, PaymentWriteError, WriteStage};

const CUSTOMER_COLUMNS: &str =
    "id, owner_id, name, phone, opening_balance, balance, last_transaction, created_at";
const TRANSACTION_COLUMNS: &str =
    "id, sequence, customer_id, owner_id, amount, type, notes, created_at";
const ITEM_COLUMNS: &str =
    "id, owner_id, name, category, quantity, price, reorder_level, created_at";
const EXPENSE_COLUMNS: &str = "id, owner_id, amount, category, description, date, created_at";
const SALE_COLUMNS: &str = "id, owner_id, date, amount, cost, items, created_at";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Sums of customer balances split by sign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceTotals {
    /// Sum of negative balances, as a positive magnitude
    pub receivable: Paise,
    /// Sum of positive balances
    pub advances: Paise,
}

/// Repository for one owner's customers, ledger, inventory, expenses and sales.
///
/// Obtained from [`Database::scoped`](super::Database::scoped). Every query
/// filters on the owner it was created for, so rows of other owners are
/// neither visible nor writable through it.
#[derive(Debug, Clone)]
pub struct OwnerRepository {
    pool: SqlitePool,
    owner: OwnerId,
}

impl OwnerRepository {
    pub(crate) fn new(pool: SqlitePool, owner: OwnerId) -> Self {
        Self { pool, owner }
    }

    // ========================
    // Customer operations
    // ========================

    /// Save a new customer. The customer must belong to this owner.
    pub async fn save_customer(&self, customer: &Customer) -> Result<()> {
        if customer.owner_id != self.owner {
            bail!("Customer {} belongs to another owner", customer.id);
        }

        sqlx::query(
            r#"
            INSERT INTO customers (id, owner_id, name, phone, opening_balance, balance, last_transaction, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(customer.id.to_string())
        .bind(self.owner.to_string())
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.opening_balance)
        .bind(customer.balance)
        .bind(customer.last_transaction.map(|dt| dt.to_rfc3339()))
        .bind(customer.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save customer")?;
        Ok(())
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM customers WHERE id = ? AND owner_id = ?",
            CUSTOMER_COLUMNS
        ))
        .bind(id.to_string())
        .bind(self.owner.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch customer")?;

        row.as_ref().map(Self::row_to_customer).transpose()
    }

    /// Customers whose name matches exactly, ignoring case.
    pub async fn find_customers_by_name(&self, name: &str) -> Result<Vec<Customer>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM customers WHERE owner_id = ? AND name = ? COLLATE NOCASE ORDER BY created_at",
            CUSTOMER_COLUMNS
        ))
        .bind(self.owner.to_string())
        .bind(name.trim())
        .fetch_all(&self.pool)
        .await
        .context("Failed to find customers by name")?;

        rows.iter().map(Self::row_to_customer).collect()
    }

    pub async fn list_customers(&self) -> Result<Vec<Customer>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM customers WHERE owner_id = ? ORDER BY name COLLATE NOCASE",
            CUSTOMER_COLUMNS
        ))
        .bind(self.owner.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list customers")?;

        rows.iter().map(Self::row_to_customer).collect()
    }

    /// Customers ordered by balance ascending, so the largest debts come first.
    pub async fn list_customers_by_balance(&self) -> Result<Vec<Customer>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM customers WHERE owner_id = ? ORDER BY balance ASC, name COLLATE NOCASE",
            CUSTOMER_COLUMNS
        ))
        .bind(self.owner.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list customers by balance")?;

        rows.iter().map(Self::row_to_customer).collect()
    }

    /// Update name and/or phone. Returns false if the customer does not exist.
    pub async fn update_customer_details(
        &self,
        id: CustomerId,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET name = COALESCE(?, name), phone = COALESCE(?, phone)
            WHERE id = ? AND owner_id = ?
            "#,
        )
        .bind(name)
        .bind(phone)
        .bind(id.to_string())
        .bind(self.owner.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update customer")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_customers(&self) -> Result<i64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) as count FROM customers WHERE owner_id = ?")
            .bind(self.owner.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to count customers")?
            .get("count");
        Ok(count)
    }

    pub async fn balance_totals(&self) -> Result<BalanceTotals> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN balance < 0 THEN -balance ELSE 0 END), 0) as receivable,
                COALESCE(SUM(CASE WHEN balance > 0 THEN balance ELSE 0 END), 0) as advances
            FROM customers
            WHERE owner_id = ?
            "#,
        )
        .bind(self.owner.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute balance totals")?;

        Ok(BalanceTotals {
            receivable: row.get("receivable"),
            advances: row.get("advances"),
        })
    }

    // ========================
    // Transaction operations
    // ========================

    /// Every transaction of this owner in creation order.
    pub async fn list_all_transactions(&self) -> Result<Vec<LedgerTransaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM transactions WHERE owner_id = ? ORDER BY sequence ASC",
            TRANSACTION_COLUMNS
        ))
        .bind(self.owner.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    async fn next_sequence(conn: &mut SqliteConnection) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'transaction_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&mut *conn)
        .await
        .context("Failed to get next sequence number")?;

        Ok(row.get("value"))
    }

    /// Assign the next sequence number and insert the row. The customer must
    /// exist under this owner.
    async fn write_transaction(
        &self,
        conn: &mut SqliteConnection,
        txn: &mut LedgerTransaction,
    ) -> Result<()> {
        if txn.owner_id != self.owner {
            bail!("Transaction {} belongs to another owner", txn.id);
        }

        let sequence = Self::next_sequence(conn).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO transactions (id, sequence, customer_id, owner_id, amount, type, notes, created_at)
            SELECT ?, ?, ?, ?, ?, ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM customers WHERE id = ? AND owner_id = ?)
            "#,
        )
        .bind(txn.id.to_string())
        .bind(sequence)
        .bind(txn.customer_id.to_string())
        .bind(self.owner.to_string())
        .bind(txn.amount)
        .bind(txn.kind.as_str())
        .bind(&txn.notes)
        .bind(txn.created_at.to_rfc3339())
        .bind(txn.customer_id.to_string())
        .bind(self.owner.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to save transaction")?;

        if result.rows_affected() == 0 {
            bail!("Customer {} not found", txn.customer_id);
        }

        txn.sequence = sequence;
        Ok(())
    }

    async fn write_balance(
        &self,
        conn: &mut SqliteConnection,
        customer_id: CustomerId,
        balance: Paise,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE customers SET balance = ?, last_transaction = ? WHERE id = ? AND owner_id = ?",
        )
        .bind(balance)
        .bind(at.to_rfc3339())
        .bind(customer_id.to_string())
        .bind(self.owner.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to update customer balance")?;

        if result.rows_affected() == 0 {
            bail!("Customer {} not found", customer_id);
        }
        Ok(())
    }

    // ========================
    // Inventory operations
    // ========================

    pub async fn save_item(&self, item: &InventoryItem) -> Result<()> {
        if item.owner_id != self.owner {
            bail!("Item {} belongs to another owner", item.id);
        }

        sqlx::query(
            r#"
            INSERT INTO inventory (id, owner_id, name, category, quantity, price, reorder_level, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item.id.to_string())
        .bind(self.owner.to_string())
        .bind(&item.name)
        .bind(&item.category)
        .bind(item.quantity)
        .bind(item.price)
        .bind(item.reorder_level)
        .bind(item.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save inventory item")?;
        Ok(())
    }

    pub async fn get_item(&self, id: ItemId) -> Result<Option<InventoryItem>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM inventory WHERE id = ? AND owner_id = ?",
            ITEM_COLUMNS
        ))
        .bind(id.to_string())
        .bind(self.owner.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch inventory item")?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    pub async fn list_items(&self) -> Result<Vec<InventoryItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM inventory WHERE owner_id = ? ORDER BY name COLLATE NOCASE",
            ITEM_COLUMNS
        ))
        .bind(self.owner.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list inventory")?;

        rows.iter().map(Self::row_to_item).collect()
    }

    /// Items at or below their reorder level, emptiest first.
    pub async fn low_stock_items(&self) -> Result<Vec<InventoryItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM inventory WHERE owner_id = ? AND quantity <= reorder_level ORDER BY quantity ASC, name COLLATE NOCASE",
            ITEM_COLUMNS
        ))
        .bind(self.owner.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list low stock items")?;

        rows.iter().map(Self::row_to_item).collect()
    }

    /// Overwrite the editable fields of an item. Returns false if it does not exist.
    pub async fn update_item(&self, item: &InventoryItem) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE inventory
            SET name = ?, category = ?, quantity = ?, price = ?, reorder_level = ?
            WHERE id = ? AND owner_id = ?
            "#,
        )
        .bind(&item.name)
        .bind(&item.category)
        .bind(item.quantity)
        .bind(item.price)
        .bind(item.reorder_level)
        .bind(item.id.to_string())
        .bind(self.owner.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update inventory item")?;

        Ok(result.rows_affected() > 0)
    }

    // ========================
    // Expense operations
    // ========================

    pub async fn save_expense(&self, expense: &Expense) -> Result<()> {
        if expense.owner_id != self.owner {
            bail!("Expense {} belongs to another owner", expense.id);
        }

        sqlx::query(
            r#"
            INSERT INTO expenses (id, owner_id, amount, category, description, date, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(expense.id.to_string())
        .bind(self.owner.to_string())
        .bind(expense.amount)
        .bind(expense.category.as_str())
        .bind(&expense.description)
        .bind(expense.date.format(DATE_FORMAT).to_string())
        .bind(expense.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save expense")?;
        Ok(())
    }

    pub async fn get_expense(&self, id: ExpenseId) -> Result<Option<Expense>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM expenses WHERE id = ? AND owner_id = ?",
            EXPENSE_COLUMNS
        ))
        .bind(id.to_string())
        .bind(self.owner.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch expense")?;

        row.as_ref().map(Self::row_to_expense).transpose()
    }

    /// Delete an expense. Returns false if it does not exist.
    pub async fn delete_expense(&self, id: ExpenseId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ? AND owner_id = ?")
            .bind(id.to_string())
            .bind(self.owner.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete expense")?;

        Ok(result.rows_affected() > 0)
    }

    /// Expenses, most recent date first.
    pub async fn list_expenses(&self) -> Result<Vec<Expense>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM expenses WHERE owner_id = ? ORDER BY date DESC, created_at DESC",
            EXPENSE_COLUMNS
        ))
        .bind(self.owner.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list expenses")?;

        rows.iter().map(Self::row_to_expense).collect()
    }

    /// Total spent between two dates, both inclusive.
    pub async fn sum_expenses_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Paise> {
        let total: Paise = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0) as total
            FROM expenses
            WHERE owner_id = ? AND date >= ? AND date <= ?
            "#,
        )
        .bind(self.owner.to_string())
        .bind(from.format(DATE_FORMAT).to_string())
        .bind(to.format(DATE_FORMAT).to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum expenses")?
        .get("total");
        Ok(total)
    }

    /// All-time totals per category, largest first.
    pub async fn sum_expenses_by_category(&self) -> Result<Vec<(ExpenseCategory, Paise)>> {
        let rows = sqlx::query(
            r#"
            SELECT category, SUM(amount) as total
            FROM expenses
            WHERE owner_id = ?
            GROUP BY category
            ORDER BY total DESC, category
            "#,
        )
        .bind(self.owner.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to sum expenses by category")?;

        rows.iter()
            .map(|row| -> Result<(ExpenseCategory, Paise)> {
                let category_str: String = row.get("category");
                let category = ExpenseCategory::from_str(&category_str)
                    .with_context(|| format!("Invalid expense category: {}", category_str))?;
                Ok((category, row.get("total")))
            })
            .collect()
    }

    // ========================
    // Sale operations
    // ========================

    pub async fn save_sale(&self, sale: &Sale) -> Result<()> {
        if sale.owner_id != self.owner {
            bail!("Sale {} belongs to another owner", sale.id);
        }

        let items = serde_json::to_string(&sale.items).context("Failed to encode sale items")?;
        sqlx::query(
            r#"
            INSERT INTO sales (id, owner_id, date, amount, cost, items, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(sale.id.to_string())
        .bind(self.owner.to_string())
        .bind(sale.date.format(DATE_FORMAT).to_string())
        .bind(sale.amount)
        .bind(sale.cost)
        .bind(items)
        .bind(sale.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save sale")?;
        Ok(())
    }

    /// Every sale, most recent date first.
    pub async fn list_sales(&self) -> Result<Vec<Sale>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM sales WHERE owner_id = ? ORDER BY date DESC, created_at DESC",
            SALE_COLUMNS
        ))
        .bind(self.owner.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list sales")?;

        rows.iter().map(Self::row_to_sale).collect()
    }

    /// Sales dated between two days, both inclusive, most recent first.
    pub async fn list_sales_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Sale>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM sales WHERE owner_id = ? AND date >= ? AND date <= ? ORDER BY date DESC, created_at DESC",
            SALE_COLUMNS
        ))
        .bind(self.owner.to_string())
        .bind(from.format(DATE_FORMAT).to_string())
        .bind(to.format(DATE_FORMAT).to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list sales")?;

        rows.iter().map(Self::row_to_sale).collect()
    }

    /// Per-day totals between two days, both inclusive, oldest first.
    /// Days without sales are absent.
    pub async fn daily_sales_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailySales>> {
        let rows = sqlx::query(
            r#"
            SELECT date, COUNT(*) as sale_count, SUM(amount) as revenue, SUM(amount - cost) as profit
            FROM sales
            WHERE owner_id = ? AND date >= ? AND date <= ?
            GROUP BY date
            ORDER BY date
            "#,
        )
        .bind(self.owner.to_string())
        .bind(from.format(DATE_FORMAT).to_string())
        .bind(to.format(DATE_FORMAT).to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to aggregate daily sales")?;

        rows.iter().map(Self::row_to_daily_sales).collect()
    }

    /// Totals for the most recent day that has any sale.
    pub async fn latest_daily_sales(&self) -> Result<Option<DailySales>> {
        let row = sqlx::query(
            r#"
            SELECT date, COUNT(*) as sale_count, SUM(amount) as revenue, SUM(amount - cost) as profit
            FROM sales
            WHERE owner_id = ?
            GROUP BY date
            ORDER BY date DESC
            LIMIT 1
            "#,
        )
        .bind(self.owner.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch latest daily sales")?;

        row.as_ref().map(Self::row_to_daily_sales).transpose()
    }

    // ========================
    // Row mappers
    // ========================

    fn parse_timestamp(value: &str, what: &str) -> Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(value)
            .with_context(|| format!("Invalid {} timestamp", what))?
            .with_timezone(&Utc))
    }

    fn row_to_customer(row: &sqlx::sqlite::SqliteRow) -> Result<Customer> {
        let id_str: String = row.get("id");
        let owner_str: String = row.get("owner_id");
        let last_transaction_str: Option<String> = row.get("last_transaction");
        let created_at_str: String = row.get("created_at");

        Ok(Customer {
            id: Uuid::parse_str(&id_str).context("Invalid customer ID")?,
            owner_id: Uuid::parse_str(&owner_str).context("Invalid owner ID")?,
            name: row.get("name"),
            phone: row.get("phone"),
            opening_balance: row.get("opening_balance"),
            balance: row.get("balance"),
            last_transaction: last_transaction_str
                .map(|s| Self::parse_timestamp(&s, "last_transaction"))
                .transpose()?,
            created_at: Self::parse_timestamp(&created_at_str, "created_at")?,
        })
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<LedgerTransaction> {
        let id_str: String = row.get("id");
        let customer_str: String = row.get("customer_id");
        let owner_str: String = row.get("owner_id");
        let kind_str: String = row.get("type");
        let created_at_str: String = row.get("created_at");

        Ok(LedgerTransaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            sequence: row.get("sequence"),
            customer_id: Uuid::parse_str(&customer_str).context("Invalid customer ID")?,
            owner_id: Uuid::parse_str(&owner_str).context("Invalid owner ID")?,
            amount: row.get("amount"),
            kind: TransactionType::from_str(&kind_str)
                .with_context(|| format!("Invalid transaction type: {}", kind_str))?,
            notes: row.get("notes"),
            created_at: Self::parse_timestamp(&created_at_str, "created_at")?,
        })
    }

    fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<InventoryItem> {
        let id_str: String = row.get("id");
        let owner_str: String = row.get("owner_id");
        let created_at_str: String = row.get("created_at");

        Ok(InventoryItem {
            id: Uuid::parse_str(&id_str).context("Invalid item ID")?,
            owner_id: Uuid::parse_str(&owner_str).context("Invalid owner ID")?,
            name: row.get("name"),
            category: row.get("category"),
            quantity: row.get("quantity"),
            price: row.get("price"),
            reorder_level: row.get("reorder_level"),
            created_at: Self::parse_timestamp(&created_at_str, "created_at")?,
        })
    }

    fn row_to_expense(row: &sqlx::sqlite::SqliteRow) -> Result<Expense> {
        let id_str: String = row.get("id");
        let owner_str: String = row.get("owner_id");
        let category_str: String = row.get("category");
        let date_str: String = row.get("date");
        let created_at_str: String = row.get("created_at");

        Ok(Expense {
            id: Uuid::parse_str(&id_str).context("Invalid expense ID")?,
            owner_id: Uuid::parse_str(&owner_str).context("Invalid owner ID")?,
            amount: row.get("amount"),
            category: ExpenseCategory::from_str(&category_str)
                .with_context(|| format!("Invalid expense category: {}", category_str))?,
            description: row.get("description"),
            date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT).context("Invalid expense date")?,
            created_at: Self::parse_timestamp(&created_at_str, "created_at")?,
        })
    }
    fn row_to_sale(row: &sqlx::sqlite::SqliteRow) -> Result<Sale> {
        let id_str: String = row.get("id");
        let owner_str: String = row.get("owner_id");
        let date_str: String = row.get("date");
        let items_json: String = row.get("items");
        let created_at_str: String = row.get("created_at");

        Ok(Sale {
            id: Uuid::parse_str(&id_str).context("Invalid sale ID")?,
            owner_id: Uuid::parse_str(&owner_str).context("Invalid owner ID")?,
            date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT).context("Invalid sale date")?,
            amount: row.get("amount"),
            cost: row.get("cost"),
            items: serde_json::from_str(&items_json).context("Invalid sale items")?,
            created_at: Self::parse_timestamp(&created_at_str, "created_at")?,
        })
    }

    fn row_to_daily_sales(row: &sqlx::sqlite::SqliteRow) -> Result<DailySales> {
        let date_str: String = row.get("date");

        Ok(DailySales {
            date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT).context("Invalid sale date")?,
            sale_count: row.get("sale_count"),
            revenue: row.get("revenue"),
            profit: row.get("profit"),
        })
    }
}

impl LedgerStore for OwnerRepository {
    fn owner_id(&self) -> OwnerId {
        self.owner
    }

    async fn insert_transaction(&self, txn: &mut LedgerTransaction) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        self.write_transaction(&mut *tx, txn).await?;
        tx.commit().await.context("Failed to commit transaction")?;
        Ok(())
    }

    async fn update_balance(
        &self,
        customer_id: CustomerId,
        balance: Paise,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        self.write_balance(&mut *conn, customer_id, balance, at).await
    }

    async fn transactions_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<LedgerTransaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM transactions WHERE customer_id = ? AND owner_id = ? ORDER BY sequence DESC",
            TRANSACTION_COLUMNS
        ))
        .bind(customer_id.to_string())
        .bind(self.owner.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions for customer")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Both writes run inside one SQL transaction, so a failure at any
    /// stage leaves neither the row nor the balance behind.
    async fn commit_payment(
        &self,
        txn: &mut LedgerTransaction,
        new_balance: Paise,
        at: DateTime<Utc>,
    ) -> Result<(), PaymentWriteError> {
        let not_applied = |stage: WriteStage| {
            move |source: anyhow::Error| PaymentWriteError::NotApplied { stage, source }
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(not_applied(WriteStage::TransactionInsert))?;

        let sequence_before = txn.sequence;
        if let Err(e) = self.write_transaction(&mut *tx, txn).await {
            return Err(not_applied(WriteStage::TransactionInsert)(e));
        }

        if let Err(e) = self
            .write_balance(&mut *tx, txn.customer_id, new_balance, at)
            .await
        {
            // Dropping `tx` rolls back; the sequence was never persisted
            txn.sequence = sequence_before;
            return Err(not_applied(WriteStage::BalanceUpdate)(e));
        }

        if let Err(e) = tx.commit().await.context("Failed to commit payment") {
            txn.sequence = sequence_before;
            return Err(not_applied(WriteStage::Commit)(e));
        }

        Ok(())
    }
}
