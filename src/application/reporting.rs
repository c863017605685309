use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Customer, DailySales, Expense, ExpenseCategory, InventoryItem, LedgerTransaction, Paise, Profile, Sale,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub product_count: usize,
    pub customer_count: i64,
    pub low_stock_count: usize,
    /// Total owed to the business (sum of negative balances, as a magnitude)
    pub total_receivable: Paise,
    /// Total prepaid credit held by customers
    pub total_advances: Paise,
    pub monthly_expenses: Paise,
    pub stock_value: Paise,
    /// Most recent day with any sale
    pub latest_sales: Option<DailySales>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: ExpenseCategory,
    pub total: Paise,
    /// Share of all-time expenses, 0-100
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseSummary {
    pub total: Paise,
    pub month_start: NaiveDate,
    pub month_end: NaiveDate,
    pub this_month: Paise,
    pub categories: Vec<CategorySummary>,
}

/// Revenue and profit over a window of days ending `to`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub sale_count: i64,
    pub revenue: Paise,
    pub profit: Paise,
    /// Days with at least one sale, oldest first
    pub days: Vec<DailySales>,
}

impl SalesSummary {
    pub(crate) fn from_days(from: NaiveDate, to: NaiveDate, days: Vec<DailySales>) -> Self {
        Self {
            from,
            to,
            sale_count: days.iter().map(|d| d.sale_count).sum(),
            revenue: days.iter().fold(0, |sum: Paise, d| sum.saturating_add(d.revenue)),
            profit: days.iter().fold(0, |sum: Paise, d| sum.saturating_add(d.profit)),
            days,
        }
    }
}

/// Everything stored for one owner, as written by the JSON export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerSnapshot {
    pub exported_at: DateTime<Utc>,
    pub profile: Profile,
    pub customers: Vec<Customer>,
    pub transactions: Vec<LedgerTransaction>,
    pub inventory: Vec<InventoryItem>,
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub sales: Vec<Sale>,
}

/// First and last day of the calendar month containing `day`.
pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = day.with_day(1).unwrap_or(day);
    let next_month = if day.month() == 12 {
        NaiveDate::from_ymd_opt(day.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(day.year(), day.month() + 1, 1)
    };
    let end = next_month.and_then(|d| d.pred_opt()).unwrap_or(day);
    (start, end)
}

pub(crate) fn category_summaries(totals: Vec<(ExpenseCategory, Paise)>) -> Vec<CategorySummary> {
    let grand_total: Paise = totals.iter().map(|(_, total)| *total).sum();
    totals
        .into_iter()
        .map(|(category, total)| CategorySummary {
            category,
            total,
            percentage: if grand_total > 0 {
                total as f64 / grand_total as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(month_bounds(date(2024, 2, 14)), (date(2024, 2, 1), date(2024, 2, 29)));
        assert_eq!(month_bounds(date(2023, 12, 31)), (date(2023, 12, 1), date(2023, 12, 31)));
        assert_eq!(month_bounds(date(2024, 4, 1)), (date(2024, 4, 1), date(2024, 4, 30)));
    }

    #[test]
    fn test_category_percentages() {
        let summaries = category_summaries(vec![
            (ExpenseCategory::Rent, 15000),
            (ExpenseCategory::Utilities, 5000),
        ]);
        assert_eq!(summaries[0].percentage, 75.0);
        assert_eq!(summaries[1].percentage, 25.0);
        assert!(category_summaries(vec![]).is_empty());
    }

    #[test]
    fn test_sales_summary_totals() {
        let days = vec![
            DailySales { date: date(2024, 3, 9), sale_count: 2, revenue: 120000, profit: 20000 },
            DailySales { date: date(2024, 3, 11), sale_count: 1, revenue: 5000, profit: -1000 },
        ];
        let summary = SalesSummary::from_days(date(2024, 3, 5), date(2024, 3, 11), days);
        assert_eq!(summary.sale_count, 3);
        assert_eq!(summary.revenue, 125000);
        assert_eq!(summary.profit, 19000);
        assert_eq!(summary.days.len(), 2);

        let empty = SalesSummary::from_days(date(2024, 3, 5), date(2024, 3, 11), Vec::new());
        assert_eq!((empty.sale_count, empty.revenue, empty.profit), (0, 0, 0));
    }
}
