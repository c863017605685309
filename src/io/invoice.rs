use std::io::Write;

use anyhow::Result;

use crate::domain::{GstInvoice, format_paise};

const RULE_WIDTH: usize = 78;

/// Write a GST invoice as a plain-text document.
pub fn render_invoice<W: Write>(invoice: &GstInvoice, mut writer: W) -> Result<()> {
    let rule = "=".repeat(RULE_WIDTH);
    let thin_rule = "-".repeat(RULE_WIDTH);

    writeln!(writer, "{}", rule)?;
    writeln!(writer, "{:^width$}", "TAX INVOICE", width = RULE_WIDTH)?;
    writeln!(writer, "{}", rule)?;
    writeln!(writer, "{}", invoice.seller_name)?;
    if let Some(gstin) = &invoice.seller_gstin {
        writeln!(writer, "GSTIN: {}", gstin)?;
    }
    writeln!(writer)?;
    writeln!(writer, "Invoice Number: {}", invoice.number)?;
    writeln!(writer, "Date:           {}", invoice.issued_at.format("%d/%m/%Y"))?;
    writeln!(writer)?;
    writeln!(writer, "Bill To: {}", invoice.customer_name)?;
    if let Some(gstin) = &invoice.customer_gstin {
        writeln!(writer, "GSTIN:   {}", gstin)?;
    }
    writeln!(writer, "{}", thin_rule)?;

    writeln!(
        writer,
        "{:<24} {:>6} {:>12} {:>6} {:>12} {:>13}",
        "Item", "Qty", "Price", "GST %", "GST Amt", "Total"
    )?;
    writeln!(writer, "{}", thin_rule)?;
    for line in &invoice.lines {
        writeln!(
            writer,
            "{:<24} {:>6} {:>12} {:>6} {:>12} {:>13}",
            truncate(&line.name, 24),
            line.quantity,
            format_paise(line.unit_price),
            format!("{}%", line.gst_rate.percent()),
            format_paise(line.gst_amount()),
            format_paise(line.total()),
        )?;
    }
    writeln!(writer, "{}", thin_rule)?;

    let totals = invoice.totals();
    writeln!(writer, "{:>62} {:>15}", "Subtotal:", format!("₹{}", format_paise(totals.subtotal)))?;
    writeln!(writer, "{:>62} {:>15}", "Total GST:", format!("₹{}", format_paise(totals.total_gst)))?;
    writeln!(
        writer,
        "{:>62} {:>15}",
        "Grand Total:",
        format!("₹{}", format_paise(totals.grand_total))
    )?;
    writeln!(writer, "{}", rule)?;
    writeln!(writer, "This is a computer generated invoice")?;
    writer.flush()?;
    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::{GstRate, InvoiceLine, Profile};

    #[test]
    fn test_render_invoice() {
        let seller = Profile::new("Sharma Kirana".into()).with_gstin(Some("29ABCDE1234F1Z5".into()));
        let invoice = GstInvoice::build(
            &seller,
            "Rajesh Kumar",
            None,
            vec![
                InvoiceLine::new("Soap", 3, 4000, GstRate::Eighteen),
                InvoiceLine::new("Extra Long Product Name For Testing", 1, 1000, GstRate::Zero),
            ],
            Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap(),
        )
        .unwrap();

        let mut out = Vec::new();
        render_invoice(&invoice, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("TAX INVOICE"));
        assert!(text.contains("GSTIN: 29ABCDE1234F1Z5"));
        assert!(text.contains("Date:           15/03/2024"));
        assert!(text.contains("Bill To: Rajesh Kumar"));
        assert!(text.contains("Extra Long Product Na..."));
        assert!(text.contains("₹130.00")); // subtotal
        assert!(text.contains("₹21.60")); // GST
        assert!(text.contains("₹151.60")); // grand total
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Soap", 24), "Soap");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
    }
}
