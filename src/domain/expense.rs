use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OwnerId, Paise};

pub type ExpenseId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExpenseCategory {
    Rent,
    Utilities,
    Supplies,
    Salaries,
    Transportation,
    Marketing,
    Maintenance,
    Insurance,
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 9] = [
        ExpenseCategory::Rent,
        ExpenseCategory::Utilities,
        ExpenseCategory::Supplies,
        ExpenseCategory::Salaries,
        ExpenseCategory::Transportation,
        ExpenseCategory::Marketing,
        ExpenseCategory::Maintenance,
        ExpenseCategory::Insurance,
        ExpenseCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Rent => "Rent",
            ExpenseCategory::Utilities => "Utilities",
            ExpenseCategory::Supplies => "Supplies",
            ExpenseCategory::Salaries => "Salaries",
            ExpenseCategory::Transportation => "Transportation",
            ExpenseCategory::Marketing => "Marketing",
            ExpenseCategory::Maintenance => "Maintenance",
            ExpenseCategory::Insurance => "Insurance",
            ExpenseCategory::Other => "Other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|c| c.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub owner_id: OwnerId,
    pub amount: Paise,
    pub category: ExpenseCategory,
    pub description: Option<String>,
    /// Calendar day the money was spent
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(owner_id: OwnerId, amount: Paise, category: ExpenseCategory, date: NaiveDate) -> Self {
        assert!(amount > 0, "Expense amount must be positive");
        Self {
            id: Uuid::new_v4(),
            owner_id,
            amount,
            category,
            description: None,
            date,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip() {
        for category in ExpenseCategory::ALL {
            assert_eq!(ExpenseCategory::from_str(category.as_str()), Some(category));
        }
        assert_eq!(ExpenseCategory::from_str("utilities"), Some(ExpenseCategory::Utilities));
        assert_eq!(ExpenseCategory::from_str("Travel"), None);
    }

    #[test]
    #[should_panic(expected = "Expense amount must be positive")]
    fn test_expense_requires_positive_amount() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        Expense::new(Uuid::new_v4(), -100, ExpenseCategory::Rent, date);
    }
}
