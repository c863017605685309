use anyhow::Result;
use chrono::NaiveDate;
use std::io::Write;

use crate::application::{BusinessService, OwnerSnapshot};
use crate::domain::{CustomerId, format_paise};

/// Exporter for writing one business's data to CSV or JSON.
pub struct Exporter<'a> {
    service: &'a BusinessService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a BusinessService) -> Self {
        Self { service }
    }

    /// Export customers to CSV, biggest debtors first.
    pub async fn export_customers_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let customers = self.service.customers_by_balance().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["Name", "Phone", "Balance", "Status", "Last Transaction"])?;

        let mut count = 0;
        for customer in &customers {
            csv_writer.write_record([
                customer.name.as_str(),
                customer.phone.as_str(),
                &format_paise(customer.balance),
                customer.status().short_label(),
                &customer
                    .last_transaction
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| "N/A".to_string()),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export stock on hand to CSV.
    pub async fn export_inventory_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let items = self.service.list_items().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["Product", "Category", "Quantity", "Price", "Value", "Low Stock"])?;

        let mut count = 0;
        for item in &items {
            csv_writer.write_record([
                item.name.as_str(),
                item.category.as_str(),
                &item.quantity.to_string(),
                &format_paise(item.price),
                &format_paise(item.stock_value()),
                if item.is_low_stock() { "yes" } else { "no" },
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export expenses to CSV, most recent first.
    pub async fn export_expenses_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let expenses = self.service.list_expenses().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["Date", "Category", "Amount", "Description"])?;

        let mut count = 0;
        for expense in &expenses {
            csv_writer.write_record([
                expense.date.to_string().as_str(),
                expense.category.as_str(),
                &format_paise(expense.amount),
                expense.description.as_deref().unwrap_or_default(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export the sales report for `from..=to` to CSV, most recent first.
    /// Items are written as a JSON array so the column stays one cell.
    pub async fn export_sales_csv<W: Write>(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        writer: W,
    ) -> Result<usize> {
        let sales = self.service.list_sales(from, to).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["Date", "Amount", "Cost", "Profit", "Items"])?;

        let mut count = 0;
        for sale in &sales {
            csv_writer.write_record([
                sale.date.to_string().as_str(),
                &format_paise(sale.amount),
                &format_paise(sale.cost),
                &format_paise(sale.profit()),
                &serde_json::to_string(&sale.items)?,
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export one customer's ledger to CSV, newest first.
    pub async fn export_ledger_csv<W: Write>(
        &self,
        customer_id: CustomerId,
        writer: W,
    ) -> Result<usize> {
        let history = self.service.transaction_history(customer_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["Date", "Type", "Label", "Amount", "Notes"])?;

        let mut count = 0;
        for txn in &history {
            csv_writer.write_record([
                txn.created_at.to_rfc3339().as_str(),
                txn.kind.as_str(),
                txn.kind.history_label(),
                &format_paise(txn.amount),
                txn.notes.as_deref().unwrap_or_default(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export everything stored for the business as a JSON snapshot.
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<OwnerSnapshot> {
        let snapshot = self.service.snapshot().await?;

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
