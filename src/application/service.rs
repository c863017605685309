use std::collections::HashMap;

use chrono::{Days, NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    Customer, CustomerId, Expense, ExpenseCategory, ExpenseId, GstInvoice, INVENTORY_CATEGORIES,
    IntegrityReport, InventoryItem, InvoiceLine, ItemId, ItemUpdate, LedgerTransaction, OwnerId, Paise,
    Profile, Sale, SaleItem, TransactionType, build_integrity_report, canonical_category,
    paise_from_f64, parse_paise, sale_amount,
};
use crate::storage::{Database, OwnerRepository};

use super::reporting::{
    DashboardStats, ExpenseSummary, OwnerSnapshot, SalesSummary, category_summaries, month_bounds,
};
use super::{AppError, CacheKey, Change, ChangeFeed, EntityKind, PaymentReceipt, QueryCache, Reconciler};

/// Application service for one business. Every operation is scoped to the
/// owner profile the service was opened for.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
pub struct BusinessService {
    db: Database,
    profile: Profile,
    repo: OwnerRepository,
    reconciler: Reconciler<OwnerRepository>,
    feed: ChangeFeed,
    customers_cache: QueryCache<Vec<Customer>>,
    history_cache: QueryCache<Vec<LedgerTransaction>>,
}

impl BusinessService {
    /// Create the database file if needed and run migrations.
    pub async fn init_database(database_path: &str) -> Result<Database, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        Ok(Database::init(&db_url).await?)
    }

    /// Connect to an existing database.
    pub async fn connect_database(database_path: &str) -> Result<Database, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        Ok(Database::connect(&db_url).await?)
    }

    /// Register a new business and open a service for it.
    pub async fn create(
        db: Database,
        business_name: &str,
        gstin: Option<String>,
    ) -> Result<Self, AppError> {
        let business_name = business_name.trim();
        if business_name.is_empty() {
            return Err(AppError::validation("business name is required"));
        }
        if db.get_profile_by_name(business_name).await?.is_some() {
            return Err(AppError::ProfileAlreadyExists(business_name.to_string()));
        }

        let profile = Profile::new(business_name.to_string()).with_gstin(gstin);
        db.save_profile(&profile).await?;
        info!(owner = %profile.id, business = %profile.business_name, "business profile created");
        Ok(Self::for_profile(db, profile))
    }

    /// Open the service for an existing business.
    pub async fn open(db: Database, business_name: &str) -> Result<Self, AppError> {
        let profile = db
            .get_profile_by_name(business_name.trim())
            .await?
            .ok_or_else(|| AppError::ProfileNotFound(business_name.to_string()))?;
        Ok(Self::for_profile(db, profile))
    }

    pub fn for_profile(db: Database, profile: Profile) -> Self {
        let feed = ChangeFeed::default();
        let repo = db.scoped(profile.id);
        Self {
            reconciler: Reconciler::new(repo.clone(), feed.clone()),
            customers_cache: QueryCache::new(&feed),
            history_cache: QueryCache::new(&feed),
            db,
            profile,
            repo,
            feed,
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn owner_id(&self) -> OwnerId {
        self.profile.id
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn reconciler(&self) -> &Reconciler<OwnerRepository> {
        &self.reconciler
    }

    pub fn changes(&self) -> &ChangeFeed {
        &self.feed
    }

    pub async fn set_gstin(&mut self, gstin: Option<String>) -> Result<&Profile, AppError> {
        let profile = self.profile.clone().with_gstin(gstin);
        self.db
            .update_profile_gstin(profile.id, profile.gstin.as_deref())
            .await?;
        self.profile = profile;
        Ok(&self.profile)
    }

    fn publish(&self, entity: EntityKind, scope: Option<Uuid>) {
        self.feed.publish(Change {
            entity,
            owner: self.profile.id,
            scope,
        });
    }

    // ========================
    // Customer operations
    // ========================

    pub async fn add_customer(
        &self,
        name: &str,
        phone: &str,
        opening_balance: Paise,
    ) -> Result<Customer, AppError> {
        let name = required("customer name", name)?;
        let phone = required("phone", phone)?;

        let customer = Customer::new(self.profile.id, name, phone, opening_balance);
        self.repo.save_customer(&customer).await?;

        info!(customer_id = %customer.id, opening_balance, "customer added");
        self.publish(EntityKind::Customers, Some(customer.id));
        Ok(customer)
    }

    /// Change name and/or phone. The balance is never touched here.
    pub async fn update_customer_details(
        &self,
        id: CustomerId,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Customer, AppError> {
        let name = name.map(|n| required("customer name", n)).transpose()?;
        let phone = phone.map(|p| required("phone", p)).transpose()?;
        if name.is_none() && phone.is_none() {
            return Err(AppError::validation("nothing to update"));
        }

        if !self
            .repo
            .update_customer_details(id, name.as_deref(), phone.as_deref())
            .await?
        {
            return Err(AppError::CustomerNotFound(id.to_string()));
        }

        self.publish(EntityKind::Customers, Some(id));
        self.get_customer(id).await
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<Customer, AppError> {
        self.repo
            .get_customer(id)
            .await?
            .ok_or_else(|| AppError::CustomerNotFound(id.to_string()))
    }

    /// Find a customer by ID or by exact (case-insensitive) name.
    pub async fn resolve_customer(&self, id_or_name: &str) -> Result<Customer, AppError> {
        if let Ok(id) = Uuid::parse_str(id_or_name.trim()) {
            return self.get_customer(id).await;
        }

        let mut matches = self.repo.find_customers_by_name(id_or_name).await?;
        match matches.len() {
            0 => Err(AppError::CustomerNotFound(id_or_name.to_string())),
            1 => Ok(matches.remove(0)),
            count => Err(AppError::AmbiguousCustomer {
                name: id_or_name.to_string(),
                count,
            }),
        }
    }

    /// Customers by name. Served from the query cache when unchanged.
    pub async fn list_customers(&self) -> Result<Vec<Customer>, AppError> {
        let key = CacheKey::all(EntityKind::Customers, self.profile.id);
        self.customers_cache
            .get_or_load(key, || async {
                debug!("loading customers");
                Ok::<_, AppError>(self.repo.list_customers().await?)
            })
            .await
    }

    /// Customers by balance ascending: biggest debtors first.
    pub async fn customers_by_balance(&self) -> Result<Vec<Customer>, AppError> {
        Ok(self.repo.list_customers_by_balance().await?)
    }

    /// Reload the customer and record a payment against its current balance.
    /// Amount validation happens in [`Reconciler::record_payment`].
    pub async fn record_payment(
        &self,
        customer_id: CustomerId,
        amount: Paise,
        kind: TransactionType,
        notes: Option<String>,
    ) -> Result<PaymentReceipt, AppError> {
        let customer = self.get_customer(customer_id).await?;
        self.reconciler
            .record_payment(&customer, amount, kind, notes)
            .await
    }

    /// Record a payment from user-entered decimal rupees, e.g. "500" or "12.50".
    pub async fn record_payment_input(
        &self,
        customer_id: CustomerId,
        amount: &str,
        kind: TransactionType,
        notes: Option<String>,
    ) -> Result<PaymentReceipt, AppError> {
        let amount = parse_paise(amount).map_err(|e| AppError::validation(e.to_string()))?;
        self.record_payment(customer_id, amount, kind, notes).await
    }

    /// Record a payment from a rupee amount. NaN and infinities are rejected.
    pub async fn record_payment_rupees(
        &self,
        customer_id: CustomerId,
        rupees: f64,
        kind: TransactionType,
        notes: Option<String>,
    ) -> Result<PaymentReceipt, AppError> {
        let amount = paise_from_f64(rupees).map_err(|e| AppError::validation(e.to_string()))?;
        self.record_payment(customer_id, amount, kind, notes).await
    }

    /// Transactions of a customer, newest first.
    pub async fn transaction_history(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<LedgerTransaction>, AppError> {
        let customer = self.get_customer(customer_id).await?;
        let key = CacheKey::scoped(EntityKind::Transactions, self.profile.id, customer.id);
        self.history_cache
            .get_or_load(key, || self.reconciler.history(customer.id))
            .await
    }

    /// Replay every customer's history and report balances that disagree.
    pub async fn verify_ledgers(&self) -> Result<IntegrityReport, AppError> {
        let customers = self.repo.list_customers().await?;
        let mut by_customer: HashMap<CustomerId, Vec<LedgerTransaction>> = HashMap::new();
        for txn in self.repo.list_all_transactions().await? {
            by_customer.entry(txn.customer_id).or_default().push(txn);
        }

        let ledgers: Vec<(Customer, Vec<LedgerTransaction>)> = customers
            .into_iter()
            .map(|c| {
                let txns = by_customer.remove(&c.id).unwrap_or_default();
                (c, txns)
            })
            .collect();

        let report = build_integrity_report(&ledgers);
        if report.is_healthy() {
            info!(customers = report.customer_count, transactions = report.transaction_count, "ledgers verified");
        } else {
            for drift in &report.drifts {
                warn!(
                    customer_id = %drift.customer_id,
                    stored = drift.stored_balance,
                    replayed = drift.replayed_balance,
                    "balance drift"
                );
            }
        }
        Ok(report)
    }

    /// Rebuild a customer's balance from its history. Returns the new balance.
    pub async fn repair_balance(&self, customer_id: CustomerId) -> Result<Paise, AppError> {
        let customer = self.get_customer(customer_id).await?;
        self.reconciler.rebuild_balance(&customer).await
    }

    // ========================
    // Inventory operations
    // ========================

    pub async fn add_item(
        &self,
        name: &str,
        category: &str,
        quantity: i64,
        price: Paise,
        reorder_level: Option<i64>,
    ) -> Result<InventoryItem, AppError> {
        let name = required("product name", name)?;
        let category = known_category(category)?;
        non_negative("quantity", quantity)?;
        non_negative("price", price)?;

        let mut item = InventoryItem::new(self.profile.id, name, category.to_string(), quantity, price);
        if let Some(level) = reorder_level {
            non_negative("reorder level", level)?;
            item = item.with_reorder_level(level);
        }

        self.repo.save_item(&item).await?;
        info!(item_id = %item.id, name = %item.name, quantity, "inventory item added");
        self.publish(EntityKind::Inventory, Some(item.id));
        Ok(item)
    }

    pub async fn update_item(
        &self,
        id: ItemId,
        mut update: ItemUpdate,
    ) -> Result<InventoryItem, AppError> {
        if update.is_empty() {
            return Err(AppError::validation("nothing to update"));
        }

        if let Some(name) = update.name.take() {
            update.name = Some(required("product name", &name)?);
        }
        if let Some(category) = update.category.take() {
            update.category = Some(known_category(&category)?.to_string());
        }
        if let Some(quantity) = update.quantity {
            non_negative("quantity", quantity)?;
        }
        if let Some(price) = update.price {
            non_negative("price", price)?;
        }
        if let Some(level) = update.reorder_level {
            non_negative("reorder level", level)?;
        }

        let mut item = self.get_item(id).await?;
        update.apply_to(&mut item);
        if !self.repo.update_item(&item).await? {
            return Err(AppError::ItemNotFound(id.to_string()));
        }

        info!(item_id = %item.id, quantity = item.quantity, "inventory item updated");
        self.publish(EntityKind::Inventory, Some(item.id));
        Ok(item)
    }

    pub async fn get_item(&self, id: ItemId) -> Result<InventoryItem, AppError> {
        self.repo
            .get_item(id)
            .await?
            .ok_or_else(|| AppError::ItemNotFound(id.to_string()))
    }

    pub async fn list_items(&self) -> Result<Vec<InventoryItem>, AppError> {
        Ok(self.repo.list_items().await?)
    }

    pub async fn low_stock_items(&self) -> Result<Vec<InventoryItem>, AppError> {
        Ok(self.repo.low_stock_items().await?)
    }

    // ========================
    // Expense operations
    // ========================

    pub async fn add_expense(
        &self,
        amount: Paise,
        category: ExpenseCategory,
        description: Option<String>,
        date: NaiveDate,
    ) -> Result<Expense, AppError> {
        if amount <= 0 {
            return Err(AppError::validation("expense amount must be greater than zero"));
        }

        let expense = Expense::new(self.profile.id, amount, category, date).with_description(description);
        self.repo.save_expense(&expense).await?;
        info!(expense_id = %expense.id, amount, category = %category, "expense added");
        self.publish(EntityKind::Expenses, Some(expense.id));
        Ok(expense)
    }

    pub async fn delete_expense(&self, id: ExpenseId) -> Result<Expense, AppError> {
        let expense = self
            .repo
            .get_expense(id)
            .await?
            .ok_or_else(|| AppError::ExpenseNotFound(id.to_string()))?;

        if !self.repo.delete_expense(id).await? {
            return Err(AppError::ExpenseNotFound(id.to_string()));
        }

        info!(expense_id = %id, "expense deleted");
        self.publish(EntityKind::Expenses, Some(id));
        Ok(expense)
    }

    /// Expenses, most recent date first.
    pub async fn list_expenses(&self) -> Result<Vec<Expense>, AppError> {
        Ok(self.repo.list_expenses().await?)
    }

    /// All-time and current-month totals, with a per-category breakdown.
    pub async fn expense_summary(&self, today: NaiveDate) -> Result<ExpenseSummary, AppError> {
        let (month_start, month_end) = month_bounds(today);
        let categories = category_summaries(self.repo.sum_expenses_by_category().await?);

        Ok(ExpenseSummary {
            total: categories.iter().map(|c| c.total).sum(),
            this_month: self.repo.sum_expenses_between(month_start, month_end).await?,
            month_start,
            month_end,
            categories,
        })
    }

    // ========================
    // Sales & analytics
    // ========================

    /// Record a sale. The amount is the sum of the item lines; `cost` is what
    /// the goods cost the business and may exceed the amount.
    pub async fn record_sale(
        &self,
        items: Vec<SaleItem>,
        cost: Paise,
        date: NaiveDate,
    ) -> Result<Sale, AppError> {
        if items.is_empty() {
            return Err(AppError::validation("a sale needs at least one item"));
        }
        non_negative("cost", cost)?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let name = required("item name", &item.name)?;
            if item.quantity <= 0 {
                return Err(AppError::validation(format!(
                    "quantity of '{}' must be greater than zero",
                    name
                )));
            }
            non_negative("unit price", item.unit_price)?;
            lines.push(SaleItem { name, ..item });
        }

        let amount = sale_amount(&lines)
            .ok_or_else(|| AppError::validation("sale total is out of range"))?;
        if amount <= 0 {
            return Err(AppError::validation("sale total must be greater than zero"));
        }

        let sale = Sale::new(self.profile.id, date, lines, amount, cost);
        self.repo.save_sale(&sale).await?;
        info!(sale_id = %sale.id, amount, profit = sale.profit(), date = %sale.date, "sale recorded");
        self.publish(EntityKind::Sales, Some(sale.id));
        Ok(sale)
    }

    /// Sales dated `from..=to`, most recent first.
    pub async fn list_sales(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Sale>, AppError> {
        date_range(from, to)?;
        Ok(self.repo.list_sales_between(from, to).await?)
    }

    /// Revenue and profit over the `days` calendar days ending `today`.
    pub async fn sales_summary(&self, today: NaiveDate, days: u32) -> Result<SalesSummary, AppError> {
        if days == 0 {
            return Err(AppError::validation("days must be at least 1"));
        }
        let from = today
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .ok_or_else(|| AppError::validation(format!("{} days before {} is out of range", days, today)))?;

        let daily = self.repo.daily_sales_between(from, today).await?;
        debug!(%from, to = %today, sale_days = daily.len(), "sales summarised");
        Ok(SalesSummary::from_days(from, today, daily))
    }

    // ========================
    // Dashboard & invoicing
    // ========================

    pub async fn dashboard_stats(&self, today: NaiveDate) -> Result<DashboardStats, AppError> {
        let items = self.repo.list_items().await?;
        let balances = self.repo.balance_totals().await?;
        let (month_start, month_end) = month_bounds(today);

        Ok(DashboardStats {
            product_count: items.len(),
            customer_count: self.repo.count_customers().await?,
            low_stock_count: items.iter().filter(|i| i.is_low_stock()).count(),
            total_receivable: balances.receivable,
            total_advances: balances.advances,
            monthly_expenses: self.repo.sum_expenses_between(month_start, month_end).await?,
            stock_value: items
                .iter()
                .fold(0, |sum: Paise, item| sum.saturating_add(item.stock_value())),
            latest_sales: self.repo.latest_daily_sales().await?,
        })
    }

    /// Validate and total a GST invoice issued by this business.
    pub fn build_invoice(
        &self,
        customer_name: &str,
        customer_gstin: Option<String>,
        lines: Vec<InvoiceLine>,
    ) -> Result<GstInvoice, AppError> {
        let invoice = GstInvoice::build(&self.profile, customer_name, customer_gstin, lines, Utc::now())?;
        debug!(number = %invoice.number, lines = invoice.lines.len(), "invoice built");
        Ok(invoice)
    }

    /// Everything stored for this business.
    pub async fn snapshot(&self) -> Result<OwnerSnapshot, AppError> {
        Ok(OwnerSnapshot {
            exported_at: Utc::now(),
            profile: self.profile.clone(),
            customers: self.repo.list_customers().await?,
            transactions: self.repo.list_all_transactions().await?,
            inventory: self.repo.list_items().await?,
            expenses: self.repo.list_expenses().await?,
            sales: self.repo.list_sales().await?,
        })
    }
}

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn non_negative(field: &str, value: i64) -> Result<(), AppError> {
    if value < 0 {
        return Err(AppError::validation(format!("{} cannot be negative", field)));
    }
    Ok(())
}

fn date_range(from: NaiveDate, to: NaiveDate) -> Result<(), AppError> {
    if from > to {
        return Err(AppError::validation(format!("start date {} is after end date {}", from, to)));
    }
    Ok(())
}

fn known_category(category: &str) -> Result<&'static str, AppError> {
    canonical_category(category).ok_or_else(|| {
        AppError::validation(format!(
            "unknown category '{}' (expected one of: {})",
            category.trim(),
            INVENTORY_CATEGORIES.join(", ")
        ))
    })
}
