use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Paise, Profile};

/// GST slabs that can be applied to an invoice line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GstRate {
    Zero,
    Five,
    Twelve,
    #[default]
    Eighteen,
    TwentyEight,
}

impl GstRate {
    pub fn percent(&self) -> u8 {
        match self {
            GstRate::Zero => 0,
            GstRate::Five => 5,
            GstRate::Twelve => 12,
            GstRate::Eighteen => 18,
            GstRate::TwentyEight => 28,
        }
    }

    pub fn from_percent(percent: u8) -> Option<Self> {
        match percent {
            0 => Some(GstRate::Zero),
            5 => Some(GstRate::Five),
            12 => Some(GstRate::Twelve),
            18 => Some(GstRate::Eighteen),
            28 => Some(GstRate::TwentyEight),
            _ => None,
        }
    }
}

impl TryFrom<u8> for GstRate {
    type Error = InvoiceError;

    fn try_from(percent: u8) -> Result<Self, Self::Error> {
        GstRate::from_percent(percent).ok_or(InvoiceError::UnsupportedRate(percent))
    }
}

impl From<GstRate> for u8 {
    fn from(rate: GstRate) -> Self {
        rate.percent()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvoiceError {
    #[error("Customer name is required")]
    MissingCustomer,

    #[error("Invoice has no items")]
    NoItems,

    #[error("Item {0} has no name")]
    UnnamedItem(usize),

    #[error("Item '{0}' must have a positive quantity")]
    InvalidQuantity(String),

    #[error("Item '{0}' must have a positive price")]
    InvalidPrice(String),

    #[error("Unsupported GST rate: {0}% (expected 0, 5, 12, 18 or 28)")]
    UnsupportedRate(u8),

    #[error("Invoice amount overflow")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub name: String,
    pub quantity: i64,
    /// Unit price in paise, before tax
    pub unit_price: Paise,
    pub gst_rate: GstRate,
}

impl InvoiceLine {
    pub fn new(name: impl Into<String>, quantity: i64, unit_price: Paise, gst_rate: GstRate) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit_price,
            gst_rate,
        }
    }

    pub fn subtotal(&self) -> Paise {
        self.quantity * self.unit_price
    }

    /// Tax on the line subtotal, rounded half-up to the paisa.
    pub fn gst_amount(&self) -> Paise {
        (self.subtotal() * i64::from(self.gst_rate.percent()) + 50) / 100
    }

    pub fn total(&self) -> Paise {
        self.subtotal() + self.gst_amount()
    }

    fn validate(&self, index: usize) -> Result<(), InvoiceError> {
        if self.name.trim().is_empty() {
            return Err(InvoiceError::UnnamedItem(index + 1));
        }
        if self.quantity <= 0 {
            return Err(InvoiceError::InvalidQuantity(self.name.clone()));
        }
        if self.unit_price <= 0 {
            return Err(InvoiceError::InvalidPrice(self.name.clone()));
        }
        // Rejects lines whose arithmetic would overflow
        self.quantity
            .checked_mul(self.unit_price)
            .and_then(|s| s.checked_mul(i64::from(self.gst_rate.percent())))
            .and_then(|t| t.checked_add(50))
            .ok_or(InvoiceError::Overflow)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Paise,
    pub total_gst: Paise,
    pub grand_total: Paise,
}

/// A GST invoice. Invoices are computed on demand and not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GstInvoice {
    pub number: String,
    pub issued_at: DateTime<Utc>,
    pub seller_name: String,
    pub seller_gstin: Option<String>,
    pub customer_name: String,
    pub customer_gstin: Option<String>,
    pub lines: Vec<InvoiceLine>,
}

impl GstInvoice {
    /// Validate the inputs and build an invoice numbered from the issue time.
    pub fn build(
        seller: &Profile,
        customer_name: &str,
        customer_gstin: Option<String>,
        lines: Vec<InvoiceLine>,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, InvoiceError> {
        let customer_name = customer_name.trim();
        if customer_name.is_empty() {
            return Err(InvoiceError::MissingCustomer);
        }
        if lines.is_empty() {
            return Err(InvoiceError::NoItems);
        }
        for (index, line) in lines.iter().enumerate() {
            line.validate(index)?;
        }

        let invoice = Self {
            number: format!("INV-{}", issued_at.timestamp_millis()),
            issued_at,
            seller_name: seller.business_name.clone(),
            seller_gstin: seller.gstin.clone(),
            customer_name: customer_name.to_string(),
            customer_gstin: customer_gstin
                .map(|g| g.trim().to_uppercase())
                .filter(|g| !g.is_empty()),
            lines,
        };
        invoice.checked_totals()?;
        Ok(invoice)
    }

    fn checked_totals(&self) -> Result<InvoiceTotals, InvoiceError> {
        let mut totals = InvoiceTotals {
            subtotal: 0,
            total_gst: 0,
            grand_total: 0,
        };
        for line in &self.lines {
            totals.subtotal = totals
                .subtotal
                .checked_add(line.subtotal())
                .ok_or(InvoiceError::Overflow)?;
            totals.total_gst = totals
                .total_gst
                .checked_add(line.gst_amount())
                .ok_or(InvoiceError::Overflow)?;
        }
        totals.grand_total = totals
            .subtotal
            .checked_add(totals.total_gst)
            .ok_or(InvoiceError::Overflow)?;
        Ok(totals)
    }

    pub fn totals(&self) -> InvoiceTotals {
        let subtotal = self
            .lines
            .iter()
            .fold(0, |sum: Paise, line| sum.saturating_add(line.subtotal()));
        let total_gst = self
            .lines
            .iter()
            .fold(0, |sum: Paise, line| sum.saturating_add(line.gst_amount()));
        InvoiceTotals {
            subtotal,
            total_gst,
            grand_total: subtotal.saturating_add(total_gst),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn seller() -> Profile {
        Profile::new("Sharma Kirana".into()).with_gstin(Some("29ABCDE1234F1Z5".into()))
    }

    fn issued() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_line_arithmetic() {
        let line = InvoiceLine::new("Basmati Rice", 2, 45000, GstRate::Five);
        assert_eq!(line.subtotal(), 90000);
        assert_eq!(line.gst_amount(), 4500);
        assert_eq!(line.total(), 94500);
    }

    #[test]
    fn test_gst_rounds_half_up() {
        // 0.33 * 18% = 0.0594 -> 0.06
        let line = InvoiceLine::new("Candy", 1, 33, GstRate::Eighteen);
        assert_eq!(line.gst_amount(), 6);
        // 0.25 * 18% = 0.045 -> 0.05
        let line = InvoiceLine::new("Candy", 1, 25, GstRate::Eighteen);
        assert_eq!(line.gst_amount(), 5);
    }

    #[test]
    fn test_invoice_totals() {
        let invoice = GstInvoice::build(
            &seller(),
            "Rajesh Kumar",
            Some("27aapfu0939f1zv".into()),
            vec![
                InvoiceLine::new("Soap", 3, 4000, GstRate::Eighteen),
                InvoiceLine::new("Milk", 2, 3000, GstRate::Zero),
                InvoiceLine::new("Biscuits", 5, 1000, GstRate::Twelve),
            ],
            issued(),
        )
        .unwrap();

        let totals = invoice.totals();
        assert_eq!(totals.subtotal, 12000 + 6000 + 5000);
        assert_eq!(totals.total_gst, 2160 + 600);
        assert_eq!(totals.grand_total, 25760);
        assert_eq!(invoice.number, format!("INV-{}", issued().timestamp_millis()));
        assert_eq!(invoice.customer_gstin.as_deref(), Some("27AAPFU0939F1ZV"));
        assert_eq!(invoice.seller_name, "Sharma Kirana");
    }

    #[test]
    fn test_invoice_validation() {
        let ok_line = || InvoiceLine::new("Soap", 1, 4000, GstRate::Eighteen);

        assert_eq!(
            GstInvoice::build(&seller(), "  ", None, vec![ok_line()], issued()),
            Err(InvoiceError::MissingCustomer)
        );
        assert_eq!(
            GstInvoice::build(&seller(), "Rajesh", None, vec![], issued()),
            Err(InvoiceError::NoItems)
        );
        assert_eq!(
            GstInvoice::build(
                &seller(),
                "Rajesh",
                None,
                vec![ok_line(), InvoiceLine::new("", 1, 100, GstRate::Zero)],
                issued()
            ),
            Err(InvoiceError::UnnamedItem(2))
        );
        assert_eq!(
            GstInvoice::build(
                &seller(),
                "Rajesh",
                None,
                vec![InvoiceLine::new("Oil", 0, 100, GstRate::Five)],
                issued()
            ),
            Err(InvoiceError::InvalidQuantity("Oil".into()))
        );
        assert_eq!(
            GstInvoice::build(
                &seller(),
                "Rajesh",
                None,
                vec![InvoiceLine::new("Oil", 1, 0, GstRate::Five)],
                issued()
            ),
            Err(InvoiceError::InvalidPrice("Oil".into()))
        );
    }

    #[test]
    fn test_rate_parsing() {
        assert_eq!(GstRate::try_from(12), Ok(GstRate::Twelve));
        assert_eq!(GstRate::try_from(15), Err(InvoiceError::UnsupportedRate(15)));
        assert_eq!(GstRate::default().percent(), 18);
    }
}
