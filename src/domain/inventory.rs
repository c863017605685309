use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OwnerId, Paise};

pub type ItemId = Uuid;

/// Reorder level applied when none is given.
pub const DEFAULT_REORDER_LEVEL: i64 = 10;

/// Product categories offered when stocking an item.
pub const INVENTORY_CATEGORIES: [&str; 6] = [
    "Groceries",
    "Snacks",
    "Beverages",
    "Personal Care",
    "Household",
    "Stationery",
];

/// Case-insensitive lookup of a known category, returning its canonical spelling.
pub fn canonical_category(input: &str) -> Option<&'static str> {
    let input = input.trim();
    INVENTORY_CATEGORIES
        .iter()
        .copied()
        .find(|c| c.eq_ignore_ascii_case(input))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub owner_id: OwnerId,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    /// Unit price in paise
    pub price: Paise,
    pub reorder_level: i64,
    pub created_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn new(owner_id: OwnerId, name: String, category: String, quantity: i64, price: Paise) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name,
            category,
            quantity,
            price,
            reorder_level: DEFAULT_REORDER_LEVEL,
            created_at: Utc::now(),
        }
    }

    pub fn with_reorder_level(mut self, reorder_level: i64) -> Self {
        self.reorder_level = reorder_level;
        self
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }

    pub fn stock_value(&self) -> Paise {
        self.quantity.saturating_mul(self.price)
    }
}

/// Partial update of an inventory item. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<i64>,
    pub price: Option<Paise>,
    pub reorder_level: Option<i64>,
}

impl ItemUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.quantity.is_none()
            && self.price.is_none()
            && self.reorder_level.is_none()
    }

    pub fn apply_to(self, item: &mut InventoryItem) {
        if let Some(name) = self.name {
            item.name = name;
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(reorder_level) = self.reorder_level {
            item.reorder_level = reorder_level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rice(quantity: i64) -> InventoryItem {
        InventoryItem::new(Uuid::new_v4(), "Rice 25kg".into(), "Groceries".into(), quantity, 125000)
    }

    #[test]
    fn test_low_stock_is_inclusive() {
        assert!(rice(10).is_low_stock());
        assert!(!rice(11).is_low_stock());
        assert!(rice(3).with_reorder_level(5).is_low_stock());
    }

    #[test]
    fn test_stock_value() {
        assert_eq!(rice(4).stock_value(), 500000);
    }

    #[test]
    fn test_canonical_category() {
        assert_eq!(canonical_category("personal care"), Some("Personal Care"));
        assert_eq!(canonical_category(" SNACKS "), Some("Snacks"));
        assert_eq!(canonical_category("Electronics"), None);
    }

    #[test]
    fn test_partial_update() {
        let mut item = rice(20);
        ItemUpdate {
            quantity: Some(8),
            ..Default::default()
        }
        .apply_to(&mut item);
        assert_eq!(item.quantity, 8);
        assert_eq!(item.name, "Rice 25kg");
        assert!(item.is_low_stock());
    }
}
