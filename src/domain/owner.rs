use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type OwnerId = Uuid;

/// The business that owns a set of rows. Every customer, item and expense
/// belongs to exactly one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: OwnerId,
    pub business_name: String,
    pub gstin: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(business_name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_name,
            gstin: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_gstin(mut self, gstin: Option<String>) -> Self {
        self.gstin = gstin.map(|g| g.trim().to_uppercase()).filter(|g| !g.is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gstin_is_normalised() {
        let profile = Profile::new("Sharma Kirana".into()).with_gstin(Some(" 29abcde1234f1z5 ".into()));
        assert_eq!(profile.gstin.as_deref(), Some("29ABCDE1234F1Z5"));

        let profile = Profile::new("Sharma Kirana".into()).with_gstin(Some("  ".into()));
        assert!(profile.gstin.is_none());
    }
}
