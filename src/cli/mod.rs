use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{AppError, BusinessService};
use crate::config::Settings;
use crate::domain::{
    Customer, ExpenseCategory, GstRate, INVENTORY_CATEGORIES, InvoiceLine, ItemUpdate, SaleItem,
    TransactionType, format_paise, format_rupees, parse_paise,
};
use crate::telemetry;

/// Days covered by sales reports when no start date is given
const DEFAULT_REPORT_DAYS: u64 = 30;

/// Khata - credit ledger, stock and expense book for small shops
#[derive(Parser)]
#[command(name = "khata")]
#[command(about = "Customer credit ledger, inventory and expense book for small shops")]
#[command(version)]
pub struct Cli {
    /// Config file (JSON). Defaults to ./khata.json when present
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file path
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Business name to operate on
    #[arg(short, long, global = true)]
    pub business: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and register the business
    Init {
        /// GSTIN printed on invoices
        #[arg(long)]
        gstin: Option<String>,
    },

    /// Customer management commands
    #[command(subcommand)]
    Customer(CustomerCommands),

    /// Record money received from a customer ("Customer Paid")
    Paid {
        /// Customer name or ID
        customer: String,

        /// Amount (e.g., "500" or "12.50")
        amount: String,

        /// Free-text note
        #[arg(long)]
        notes: Option<String>,
    },

    /// Record goods taken on account ("Customer Bought")
    Bought {
        /// Customer name or ID
        customer: String,

        /// Amount (e.g., "500" or "12.50")
        amount: String,

        /// Free-text note
        #[arg(long)]
        notes: Option<String>,
    },

    /// Show a customer's transaction history, newest first
    History {
        /// Customer name or ID
        customer: String,
    },

    /// Inventory management commands
    #[command(subcommand)]
    Inventory(InventoryCommands),

    /// Expense tracking commands
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Counter sales
    #[command(subcommand)]
    Sale(SaleCommands),

    /// Revenue and profit per day over a recent window
    Analytics {
        /// Number of days, ending today
        #[arg(long, default_value_t = 7)]
        days: u32,
    },

    /// Build a GST invoice
    Invoice {
        /// Customer name printed on the invoice
        #[arg(long)]
        customer: String,

        /// Customer GSTIN
        #[arg(long)]
        gstin: Option<String>,

        /// Line item as NAME:QTY:PRICE[:GST%] (repeatable, GST defaults to 18)
        #[arg(long = "item", required = true)]
        items: Vec<String>,

        /// Write the invoice to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Show business overview
    Dashboard,

    /// Verify every customer balance against its transaction history
    Check,

    /// Rebuild a customer's balance from its transaction history
    Repair {
        /// Customer name or ID
        customer: String,
    },

    /// Export data to CSV or JSON
    Export {
        /// What to export: customers, inventory, expenses, ledger, sales, full
        #[arg(value_name = "TYPE")]
        export_type: String,

        /// Customer name or ID (for ledger export)
        #[arg(long)]
        customer: Option<String>,

        /// First day of the sales report (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Last day of the sales report (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        to: Option<String>,

        /// Output file path (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// Add a new customer
    Add {
        /// Customer name
        name: String,

        /// Contact phone number
        #[arg(long)]
        phone: String,

        /// Opening balance: negative if the customer already owes money
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        opening: String,
    },

    /// Edit a customer's name or phone
    Edit {
        /// Customer name or ID
        customer: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New phone number
        #[arg(long)]
        phone: Option<String>,
    },

    /// List customers
    List {
        /// Sort by balance, biggest debts first
        #[arg(long)]
        by_balance: bool,
    },

    /// Show customer details
    Show {
        /// Customer name or ID
        customer: String,
    },
}

#[derive(Subcommand)]
pub enum InventoryCommands {
    /// Add a product
    Add {
        /// Product name
        name: String,

        /// Category (Groceries, Snacks, Beverages, Personal Care, Household, Stationery)
        #[arg(long)]
        category: String,

        /// Quantity in stock
        #[arg(long)]
        quantity: i64,

        /// Unit price (e.g., "45.00")
        #[arg(long)]
        price: String,

        /// Low-stock threshold (defaults to 10)
        #[arg(long)]
        reorder_level: Option<i64>,
    },

    /// Update a product
    Update {
        /// Item ID
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        quantity: Option<i64>,

        #[arg(long)]
        price: Option<String>,

        #[arg(long)]
        reorder_level: Option<i64>,
    },

    /// List products
    List,

    /// List products at or below their reorder level
    LowStock,
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record an expense
    Add {
        /// Amount (e.g., "1500" or "99.50")
        amount: String,

        /// Category (Rent, Utilities, Supplies, Salaries, Transportation, Marketing, Maintenance, Insurance, Other)
        #[arg(long)]
        category: String,

        /// Description
        #[arg(long)]
        note: Option<String>,

        /// Date of the expense (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete an expense
    Delete {
        /// Expense ID
        id: String,
    },

    /// List expenses, most recent first
    List,

    /// Show totals by month and category
    Summary,
}

#[derive(Subcommand)]
pub enum SaleCommands {
    /// Record a sale
    Add {
        /// Item as NAME:QTY:PRICE (repeatable)
        #[arg(long = "item", required = true)]
        items: Vec<String>,

        /// What the goods cost the business (e.g., "820.00")
        #[arg(long, default_value = "0")]
        cost: String,

        /// Date of the sale (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// List sales in a date range, most recent first
    List {
        /// First day (YYYY-MM-DD, defaults to 30 days before --to)
        #[arg(long)]
        from: Option<String>,

        /// Last day (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        to: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut settings = Settings::load(self.config.as_deref())?;
        if let Some(database) = self.database {
            settings.database = database;
        }
        if let Some(business) = self.business {
            settings.business = Some(business);
        }

        let filter = if self.verbose {
            "khata=debug"
        } else {
            settings.log_filter.as_str()
        };
        telemetry::init(filter, settings.log_format);

        match self.command {
            Commands::Init { gstin } => {
                let db = BusinessService::init_database(&settings.database).await?;
                println!("Database initialized: {}", settings.database);

                if let Some(business) = &settings.business {
                    let service =
                        BusinessService::create(db, business, gstin.or(settings.gstin.clone()))
                            .await?;
                    let profile = service.profile();
                    println!("Registered business: {}", profile.business_name);
                    if let Some(gstin) = &profile.gstin {
                        println!("  GSTIN: {}", gstin);
                    }
                }
            }

            Commands::Customer(customer_cmd) => {
                let service = open_service(&settings).await?;
                run_customer_command(&service, customer_cmd).await?;
            }

            Commands::Paid {
                customer,
                amount,
                notes,
            } => {
                let service = open_service(&settings).await?;
                run_payment_command(&service, &customer, &amount, TransactionType::Debit, notes)
                    .await?;
            }

            Commands::Bought {
                customer,
                amount,
                notes,
            } => {
                let service = open_service(&settings).await?;
                run_payment_command(&service, &customer, &amount, TransactionType::Credit, notes)
                    .await?;
            }

            Commands::History { customer } => {
                let service = open_service(&settings).await?;
                run_history_command(&service, &customer).await?;
            }

            Commands::Inventory(inventory_cmd) => {
                let service = open_service(&settings).await?;
                run_inventory_command(&service, inventory_cmd).await?;
            }

            Commands::Expense(expense_cmd) => {
                let service = open_service(&settings).await?;
                run_expense_command(&service, expense_cmd).await?;
            }

            Commands::Sale(sale_cmd) => {
                let service = open_service(&settings).await?;
                run_sale_command(&service, sale_cmd).await?;
            }

            Commands::Analytics { days } => {
                let service = open_service(&settings).await?;
                run_analytics_command(&service, days).await?;
            }

            Commands::Invoice {
                customer,
                gstin,
                items,
                output,
            } => {
                let service = open_service(&settings).await?;
                run_invoice_command(&service, &customer, gstin, &items, output.as_deref())?;
            }

            Commands::Dashboard => {
                let service = open_service(&settings).await?;
                run_dashboard_command(&service).await?;
            }

            Commands::Check => {
                let service = open_service(&settings).await?;
                run_check_command(&service).await?;
            }

            Commands::Repair { customer } => {
                let service = open_service(&settings).await?;
                let customer = service.resolve_customer(&customer).await?;
                let balance = service.repair_balance(customer.id).await?;
                if balance == customer.balance {
                    println!("{}: balance already consistent", customer.name);
                } else {
                    println!(
                        "{}: balance {} -> {}",
                        customer.name,
                        format_paise(customer.balance),
                        format_paise(balance)
                    );
                }
            }

            Commands::Export {
                export_type,
                customer,
                from,
                to,
                output,
            } => {
                let service = open_service(&settings).await?;
                let options = ExportOptions {
                    customer,
                    from,
                    to,
                    output,
                };
                run_export_command(&service, &export_type, options).await?;
            }
        }

        Ok(())
    }
}

/// Open the configured business. With no business configured, the only
/// registered one is used.
async fn open_service(settings: &Settings) -> Result<BusinessService> {
    let db = BusinessService::connect_database(&settings.database)
        .await
        .with_context(|| {
            format!(
                "Failed to open {}. Run 'khata init' first",
                settings.database
            )
        })?;

    let business = match &settings.business {
        Some(name) => name.clone(),
        None => {
            let mut profiles = db.list_profiles().await?;
            match profiles.len() {
                1 => profiles.remove(0).business_name,
                0 => anyhow::bail!("No business registered. Run 'khata --business <NAME> init'"),
                _ => anyhow::bail!("Several businesses registered. Pass --business <NAME>"),
            }
        }
    };

    Ok(BusinessService::open(db, &business).await?)
}

fn balance_line(customer: &Customer) -> String {
    format!(
        "{} ({})",
        format_rupees(customer.balance),
        customer.status().label()
    )
}

async fn run_customer_command(service: &BusinessService, cmd: CustomerCommands) -> Result<()> {
    match cmd {
        CustomerCommands::Add {
            name,
            phone,
            opening,
        } => {
            let opening = parse_paise(&opening).context("Invalid opening balance")?;
            let customer = service.add_customer(&name, &phone, opening).await?;
            println!("Added customer: {} ({})", customer.name, customer.id);
            println!("  Balance: {}", balance_line(&customer));
        }

        CustomerCommands::Edit {
            customer,
            name,
            phone,
        } => {
            let existing = service.resolve_customer(&customer).await?;
            let updated = service
                .update_customer_details(existing.id, name.as_deref(), phone.as_deref())
                .await?;
            println!("Updated customer: {} ({})", updated.name, updated.phone);
        }

        CustomerCommands::List { by_balance } => {
            let customers = if by_balance {
                service.customers_by_balance().await?
            } else {
                service.list_customers().await?
            };

            if customers.is_empty() {
                println!("No customers found.");
            } else {
                println!(
                    "{:<24} {:<14} {:>12} {:<8}",
                    "NAME", "PHONE", "BALANCE", "STATUS"
                );
                println!("{}", "-".repeat(62));
                for customer in customers {
                    println!(
                        "{:<24} {:<14} {:>12} {:<8}",
                        truncate(&customer.name, 24),
                        customer.phone,
                        format_paise(customer.balance),
                        customer.status().short_label()
                    );
                }
            }
        }

        CustomerCommands::Show { customer } => {
            let customer = service.resolve_customer(&customer).await?;
            println!("Customer: {}", customer.name);
            println!("  ID:               {}", customer.id);
            println!("  Phone:            {}", customer.phone);
            println!("  Balance:          {}", balance_line(&customer));
            println!("  Opening balance:  {}", format_paise(customer.opening_balance));
            println!(
                "  Created:          {}",
                customer.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            if let Some(last) = customer.last_transaction {
                println!("  Last transaction: {}", last.format("%Y-%m-%d %H:%M:%S"));
            }
        }
    }
    Ok(())
}

async fn run_payment_command(
    service: &BusinessService,
    customer: &str,
    amount: &str,
    kind: TransactionType,
    notes: Option<String>,
) -> Result<()> {
    let customer = service.resolve_customer(customer).await?;

    match service
        .record_payment_input(customer.id, amount, kind, notes)
        .await
    {
        Ok(receipt) => {
            println!(
                "{}: {} {} ({})",
                kind.action_label(),
                customer.name,
                format_rupees(receipt.transaction.amount),
                receipt.transaction.id
            );
            println!(
                "  Balance: {} -> {} ({})",
                format_paise(receipt.previous_balance),
                format_paise(receipt.new_balance),
                receipt.status.label()
            );
            Ok(())
        }
        Err(err @ AppError::InconsistentState { .. }) => {
            eprintln!(
                "The transaction was saved but the balance was not. Run 'khata repair {}' to fix it.",
                customer.id
            );
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

async fn run_history_command(service: &BusinessService, customer: &str) -> Result<()> {
    let customer = service.resolve_customer(customer).await?;
    let history = service.transaction_history(customer.id).await?;

    println!("{}: {}", customer.name, balance_line(&customer));
    println!();

    if history.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    println!(
        "{:<17} {:<17} {:>12} NOTES",
        "DATE", "TYPE", "AMOUNT"
    );
    println!("{}", "-".repeat(70));
    for txn in &history {
        let signed = format_paise(txn.signed_amount());
        let amount = if txn.signed_amount() > 0 {
            format!("+{}", signed)
        } else {
            signed
        };
        println!(
            "{:<17} {:<17} {:>12} {}",
            txn.created_at.format("%Y-%m-%d %H:%M"),
            txn.kind.history_label(),
            amount,
            truncate(txn.notes.as_deref().unwrap_or(""), 30)
        );
    }
    Ok(())
}

async fn run_inventory_command(service: &BusinessService, cmd: InventoryCommands) -> Result<()> {
    match cmd {
        InventoryCommands::Add {
            name,
            category,
            quantity,
            price,
            reorder_level,
        } => {
            let price = parse_paise(&price).context("Invalid price format. Use '45.00' or '45'")?;
            let item = service
                .add_item(&name, &category, quantity, price, reorder_level)
                .await?;
            println!("Added product: {} ({})", item.name, item.id);
        }

        InventoryCommands::Update {
            id,
            name,
            category,
            quantity,
            price,
            reorder_level,
        } => {
            let item_id = Uuid::parse_str(&id).context("Invalid item ID format (expected UUID)")?;
            let price = price
                .map(|p| parse_paise(&p))
                .transpose()
                .context("Invalid price format. Use '45.00' or '45'")?;

            let item = service
                .update_item(
                    item_id,
                    ItemUpdate {
                        name,
                        category,
                        quantity,
                        price,
                        reorder_level,
                    },
                )
                .await?;
            println!(
                "Updated product: {} (qty {}, price {})",
                item.name,
                item.quantity,
                format_paise(item.price)
            );
            if item.is_low_stock() {
                println!("  Low stock: reorder level is {}", item.reorder_level);
            }
        }

        InventoryCommands::List => {
            let items = service.list_items().await?;
            if items.is_empty() {
                println!("No products found.");
                println!("Categories: {}", INVENTORY_CATEGORIES.join(", "));
            } else {
                print_items(&items);
            }
        }

        InventoryCommands::LowStock => {
            let items = service.low_stock_items().await?;
            if items.is_empty() {
                println!("All products are well stocked.");
            } else {
                print_items(&items);
            }
        }
    }
    Ok(())
}

fn print_items(items: &[crate::domain::InventoryItem]) {
    println!(
        "{:<36} {:<22} {:<14} {:>6} {:>10} {:>12}",
        "ID", "PRODUCT", "CATEGORY", "QTY", "PRICE", "VALUE"
    );
    println!("{}", "-".repeat(105));
    for item in items {
        println!(
            "{:<36} {:<22} {:<14} {:>6} {:>10} {:>12}{}",
            item.id,
            truncate(&item.name, 22),
            item.category,
            item.quantity,
            format_paise(item.price),
            format_paise(item.stock_value()),
            if item.is_low_stock() { "  LOW" } else { "" }
        );
    }
}

async fn run_expense_command(service: &BusinessService, cmd: ExpenseCommands) -> Result<()> {
    match cmd {
        ExpenseCommands::Add {
            amount,
            category,
            note,
            date,
        } => {
            let amount = parse_paise(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
            let category = ExpenseCategory::from_str(&category).with_context(|| {
                let valid: Vec<&str> = ExpenseCategory::ALL.iter().map(|c| c.as_str()).collect();
                format!(
                    "Invalid category '{}'. Valid categories: {}",
                    category,
                    valid.join(", ")
                )
            })?;
            let date = match date {
                Some(date_str) => parse_date(&date_str)?,
                None => today(),
            };

            let expense = service.add_expense(amount, category, note, date).await?;
            println!(
                "Recorded expense: {} {} on {} ({})",
                format_rupees(expense.amount),
                expense.category,
                expense.date,
                expense.id
            );
        }

        ExpenseCommands::Delete { id } => {
            let expense_id =
                Uuid::parse_str(&id).context("Invalid expense ID format (expected UUID)")?;
            let expense = service.delete_expense(expense_id).await?;
            println!(
                "Deleted expense: {} {} on {}",
                format_rupees(expense.amount),
                expense.category,
                expense.date
            );
        }

        ExpenseCommands::List => {
            let expenses = service.list_expenses().await?;
            if expenses.is_empty() {
                println!("No expenses found.");
            } else {
                println!(
                    "{:<36} {:<12} {:<15} {:>12} DESCRIPTION",
                    "ID", "DATE", "CATEGORY", "AMOUNT"
                );
                println!("{}", "-".repeat(100));
                for expense in expenses {
                    println!(
                        "{:<36} {:<12} {:<15} {:>12} {}",
                        expense.id,
                        expense.date,
                        expense.category,
                        format_paise(expense.amount),
                        truncate(expense.description.as_deref().unwrap_or(""), 30)
                    );
                }
            }
        }

        ExpenseCommands::Summary => {
            let summary = service.expense_summary(today()).await?;
            println!("Total expenses:  {}", format_rupees(summary.total));
            println!(
                "This month:      {} ({} to {})",
                format_rupees(summary.this_month),
                summary.month_start,
                summary.month_end
            );

            if !summary.categories.is_empty() {
                println!();
                println!("{:<16} {:>12} {:>8}", "CATEGORY", "TOTAL", "SHARE");
                println!("{}", "-".repeat(38));
                for category in &summary.categories {
                    println!(
                        "{:<16} {:>12} {:>7.1}%",
                        category.category.as_str(),
                        format_paise(category.total),
                        category.percentage
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_sale_command(service: &BusinessService, cmd: SaleCommands) -> Result<()> {
    match cmd {
        SaleCommands::Add { items, cost, date } => {
            let items = items
                .iter()
                .map(|item| parse_sale_item(item))
                .collect::<Result<Vec<_>>>()?;
            let cost = parse_paise(&cost).context("Invalid cost format. Use '820.00' or '820'")?;
            let date = match date {
                Some(date_str) => parse_date(&date_str)?,
                None => today(),
            };

            let sale = service.record_sale(items, cost, date).await?;
            println!(
                "Recorded sale: {} on {} ({})",
                format_rupees(sale.amount),
                sale.date,
                sale.id
            );
            println!("  Profit: {}", format_paise(sale.profit()));
        }

        SaleCommands::List { from, to } => {
            let (from, to) = report_range(from.as_deref(), to.as_deref())?;
            let sales = service.list_sales(from, to).await?;
            if sales.is_empty() {
                println!("No sales between {} and {}.", from, to);
                return Ok(());
            }

            println!("{:<12} {:>12} {:>12} ITEMS", "DATE", "AMOUNT", "PROFIT");
            println!("{}", "-".repeat(70));
            for sale in &sales {
                let items: Vec<String> = sale
                    .items
                    .iter()
                    .map(|item| format!("{} x{}", item.name, item.quantity))
                    .collect();
                println!(
                    "{:<12} {:>12} {:>12} {}",
                    sale.date,
                    format_paise(sale.amount),
                    format_paise(sale.profit()),
                    truncate(&items.join(", "), 30)
                );
            }
        }
    }
    Ok(())
}

/// Parse `NAME:QTY:PRICE`.
fn parse_sale_item(raw: &str) -> Result<SaleItem> {
    let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
    let [name, quantity, price] = parts.as_slice() else {
        anyhow::bail!("Invalid item '{}'. Use NAME:QTY:PRICE", raw);
    };

    let quantity: i64 = quantity
        .parse()
        .with_context(|| format!("Invalid quantity in item '{}'", raw))?;
    let price = parse_paise(price).with_context(|| format!("Invalid price in item '{}'", raw))?;
    Ok(SaleItem::new(*name, quantity, price))
}

async fn run_analytics_command(service: &BusinessService, days: u32) -> Result<()> {
    let summary = service.sales_summary(today(), days).await?;

    println!("Sales from {} to {}", summary.from, summary.to);
    println!("{}", "=".repeat(40));
    println!("Sales:    {}", summary.sale_count);
    println!("Revenue:  {}", format_rupees(summary.revenue));
    println!("Profit:   {}", format_paise(summary.profit));

    if !summary.days.is_empty() {
        println!();
        println!("{:<12} {:>6} {:>12} {:>12}", "DATE", "SALES", "REVENUE", "PROFIT");
        println!("{}", "-".repeat(45));
        for day in &summary.days {
            println!(
                "{:<12} {:>6} {:>12} {:>12}",
                day.date,
                day.sale_count,
                format_paise(day.revenue),
                format_paise(day.profit)
            );
        }
    }
    Ok(())
}

fn run_invoice_command(
    service: &BusinessService,
    customer: &str,
    gstin: Option<String>,
    items: &[String],
    output: Option<&str>,
) -> Result<()> {
    use crate::io::render_invoice;
    use std::fs::File;
    use std::io::stdout;

    let lines = items
        .iter()
        .map(|item| parse_invoice_item(item))
        .collect::<Result<Vec<_>>>()?;
    let invoice = service.build_invoice(customer, gstin, lines)?;

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            render_invoice(&invoice, file)?;
            eprintln!("Invoice {} written to {}", invoice.number, path);
        }
        None => render_invoice(&invoice, stdout())?,
    }
    Ok(())
}

/// Parse `NAME:QTY:PRICE[:GST%]`.
fn parse_invoice_item(raw: &str) -> Result<InvoiceLine> {
    let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
    if parts.len() < 3 || parts.len() > 4 {
        anyhow::bail!("Invalid item '{}'. Use NAME:QTY:PRICE[:GST%]", raw);
    }

    let quantity: i64 = parts[1]
        .parse()
        .with_context(|| format!("Invalid quantity in item '{}'", raw))?;
    let price = parse_paise(parts[2]).with_context(|| format!("Invalid price in item '{}'", raw))?;
    let rate = match parts.get(3) {
        Some(rate) => {
            let percent: u8 = rate
                .trim_end_matches('%')
                .parse()
                .with_context(|| format!("Invalid GST rate in item '{}'", raw))?;
            GstRate::try_from(percent)?
        }
        None => GstRate::default(),
    };

    Ok(InvoiceLine::new(parts[0], quantity, price, rate))
}

async fn run_dashboard_command(service: &BusinessService) -> Result<()> {
    let stats = service.dashboard_stats(today()).await?;

    println!("{}", service.profile().business_name);
    println!("{}", "=".repeat(40));
    println!("Products:            {}", stats.product_count);
    println!("Low stock:           {}", stats.low_stock_count);
    println!("Stock value:         {}", format_rupees(stats.stock_value));
    println!();
    println!("Customers:           {}", stats.customer_count);
    println!("To collect:          {}", format_rupees(stats.total_receivable));
    println!("Advances held:       {}", format_rupees(stats.total_advances));
    println!();
    println!("Expenses this month: {}", format_rupees(stats.monthly_expenses));
    println!();
    match stats.latest_sales {
        Some(day) => {
            println!("Latest sales day:    {}", day.date);
            println!("  Revenue:           {}", format_rupees(day.revenue));
            println!("  Profit:            {}", format_paise(day.profit));
        }
        None => println!("No sales recorded yet"),
    }
    Ok(())
}

async fn run_check_command(service: &BusinessService) -> Result<()> {
    println!("Checking customer ledgers...\n");

    let report = service.verify_ledgers().await?;

    println!("Customers:    {}", report.customer_count);
    println!("Transactions: {}", report.transaction_count);
    println!();

    if report.is_healthy() {
        println!("All balances match their transaction history.");
        return Ok(());
    }

    if report.invalid_amounts > 0 {
        println!("Transactions with invalid amounts: {}", report.invalid_amounts);
    }
    if !report.drifts.is_empty() {
        println!(
            "{:<24} {:>12} {:>12} {:>12}",
            "CUSTOMER", "STORED", "HISTORY", "DIFFERENCE"
        );
        println!("{}", "-".repeat(63));
        for drift in &report.drifts {
            println!(
                "{:<24} {:>12} {:>12} {:>12}",
                truncate(&drift.customer_name, 24),
                format_paise(drift.stored_balance),
                format_paise(drift.replayed_balance),
                format_paise(drift.difference())
            );
        }
        println!();
        println!("Run 'khata repair <CUSTOMER>' to rebuild a balance from its history.");
    }
    anyhow::bail!("Ledger integrity check failed");
}

/// Export flags that only some export types use.
struct ExportOptions {
    customer: Option<String>,
    from: Option<String>,
    to: Option<String>,
    output: Option<String>,
}

async fn run_export_command(
    service: &BusinessService,
    export_type: &str,
    options: ExportOptions,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    // Determine output writer
    let output = options.output.as_deref();
    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "customers" => {
            let count = exporter.export_customers_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} customers", count);
            }
        }
        "inventory" => {
            let count = exporter.export_inventory_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} products", count);
            }
        }
        "expenses" => {
            let count = exporter.export_expenses_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} expenses", count);
            }
        }
        "ledger" => {
            let customer = options
                .customer
                .as_deref()
                .context("Ledger export needs --customer <NAME>")?;
            let customer = service.resolve_customer(customer).await?;
            let count = exporter.export_ledger_csv(customer.id, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} transactions for {}", count, customer.name);
            }
        }
        "sales" => {
            let (from, to) = report_range(options.from.as_deref(), options.to.as_deref())?;
            let count = exporter.export_sales_csv(from, to, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} sales from {} to {}", count, from, to);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported {}: {} customers, {} transactions, {} products, {} expenses, {} sales",
                    snapshot.profile.business_name,
                    snapshot.customers.len(),
                    snapshot.transactions.len(),
                    snapshot.inventory.len(),
                    snapshot.expenses.len(),
                    snapshot.sales.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: customers, inventory, expenses, ledger, sales, full",
                export_type
            );
        }
    }

    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))
}

/// Resolve optional report bounds: `to` defaults to today and `from` to
/// the start of the default window ending `to`.
fn report_range(from: Option<&str>, to: Option<&str>) -> Result<(NaiveDate, NaiveDate)> {
    let to = match to {
        Some(date_str) => parse_date(date_str)?,
        None => today(),
    };
    let from = match from {
        Some(date_str) => parse_date(date_str)?,
        None => to
            .checked_sub_days(Days::new(DEFAULT_REPORT_DAYS - 1))
            .context("Report start date is out of range")?,
    };
    Ok((from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_invoice_item() {
        let line = parse_invoice_item("Soap:3:40.00").unwrap();
        assert_eq!(line.name, "Soap");
        assert_eq!(line.quantity, 3);
        assert_eq!(line.unit_price, 4000);
        assert_eq!(line.gst_rate, GstRate::Eighteen);

        let line = parse_invoice_item("Milk : 2 : 30 : 5%").unwrap();
        assert_eq!(line.name, "Milk");
        assert_eq!(line.gst_rate, GstRate::Five);

        assert!(parse_invoice_item("Soap:3").is_err());
        assert!(parse_invoice_item("Soap:x:40").is_err());
        assert!(parse_invoice_item("Soap:1:40:15").is_err());
    }

    #[test]
    fn test_parse_sale_item() {
        let item = parse_sale_item("Rice 5kg : 2 : 450").unwrap();
        assert_eq!(item, SaleItem::new("Rice 5kg", 2, 45000));

        assert!(parse_sale_item("Rice:2").is_err());
        assert!(parse_sale_item("Rice:2:450:5").is_err());
        assert!(parse_sale_item("Rice:two:450").is_err());
        assert!(parse_sale_item("Rice:2:4.505").is_err());
    }

    #[test]
    fn test_report_range_defaults() {
        let (from, to) = report_range(None, Some("2024-03-31")).unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());

        let (from, _) = report_range(Some("2024-01-01"), Some("2024-03-31")).unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(report_range(Some("01/01/2024"), None).is_err());
    }

    #[test]
    fn test_cli_parses_sales_export() {
        let cli = Cli::try_parse_from([
            "khata", "export", "sales", "--from", "2024-03-01", "--to", "2024-03-31",
        ])
        .unwrap();
        match cli.command {
            Commands::Export { export_type, from, to, .. } => {
                assert_eq!(export_type, "sales");
                assert_eq!(from.as_deref(), Some("2024-03-01"));
                assert_eq!(to.as_deref(), Some("2024-03-31"));
            }
            _ => panic!("expected export command"),
        }
    }

    #[test]
    fn test_cli_parses_payment() {
        let cli = Cli::try_parse_from(["khata", "-b", "Sharma Kirana", "paid", "Rajesh", "500"]).unwrap();
        assert_eq!(cli.business.as_deref(), Some("Sharma Kirana"));
        match cli.command {
            Commands::Paid { customer, amount, notes } => {
                assert_eq!(customer, "Rajesh");
                assert_eq!(amount, "500");
                assert!(notes.is_none());
            }
            _ => panic!("expected paid command"),
        }
    }

    #[test]
    fn test_cli_accepts_negative_opening_balance() {
        let cli = Cli::try_parse_from([
            "khata", "customer", "add", "Rajesh", "--phone", "98450", "--opening", "-500",
        ])
        .unwrap();
        match cli.command {
            Commands::Customer(CustomerCommands::Add { opening, .. }) => assert_eq!(opening, "-500"),
            _ => panic!("expected customer add"),
        }
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("₹₹₹₹₹₹", 5), "₹₹...");
        assert_eq!(truncate("Rajesh", 24), "Rajesh");
    }
}
