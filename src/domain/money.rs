use thiserror::Error;

/// Money is represented as integer paise to avoid floating-point precision issues.
/// 1 rupee = 100 paise, so ₹50.00 = 5000 paise.
pub type Paise = i64;

/// Format paise as a plain decimal string.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_paise(paise: Paise) -> String {
    let sign = if paise < 0 { "-" } else { "" };
    let abs_paise = paise.unsigned_abs();
    let units = abs_paise / 100;
    let remainder = abs_paise % 100;
    format!("{}{}.{:02}", sign, units, remainder)
}

/// Format paise with the rupee sign, ignoring the sign of the amount.
/// Balances are shown as a magnitude next to their status label.
pub fn format_rupees(paise: Paise) -> String {
    format!("₹{}", format_paise(paise.saturating_abs()))
}

/// Parse a decimal string into paise.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
///
/// At most one leading minus sign and two decimal places are accepted.
pub fn parse_paise(input: &str) -> Result<Paise, ParseAmountError> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    let invalid = || ParseAmountError::InvalidFormat(input.to_string());

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(invalid());
    }

    let (units, fraction) = match digits.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (digits, ""),
    };
    if fraction.contains('.') || (units.is_empty() && fraction.is_empty()) {
        return Err(invalid());
    }
    if fraction.len() > 2 {
        return Err(ParseAmountError::TooManyDecimals(input.to_string()));
    }

    let units: i64 = if units.is_empty() {
        0
    } else {
        units.parse().map_err(|_| invalid())?
    };
    let fraction_paise: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => fraction.parse().map_err(|_| invalid())?,
    };

    let paise = units
        .checked_mul(100)
        .and_then(|p| p.checked_add(fraction_paise))
        .ok_or(ParseAmountError::OutOfRange)?;

    Ok(if negative { -paise } else { paise })
}

/// Convert a floating-point rupee amount into paise, rounding half away from zero.
/// NaN and infinities are rejected.
pub fn paise_from_f64(rupees: f64) -> Result<Paise, ParseAmountError> {
    if !rupees.is_finite() {
        return Err(ParseAmountError::NotFinite);
    }
    let scaled = (rupees * 100.0).round();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if scaled >= i64::MAX as f64 || scaled < i64::MIN as f64 {
        return Err(ParseAmountError::OutOfRange);
    }
    Ok(scaled as Paise)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAmountError {
    #[error("invalid money format: '{0}'")]
    InvalidFormat(String),

    #[error("'{0}' has more than two decimal places")]
    TooManyDecimals(String),

    #[error("amount is not a finite number")]
    NotFinite,

    #[error("amount is out of range")]
    OutOfRange,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_paise() {
        assert_eq!(format_paise(5000), "50.00");
        assert_eq!(format_paise(1234), "12.34");
        assert_eq!(format_paise(1), "0.01");
        assert_eq!(format_paise(0), "0.00");
        assert_eq!(format_paise(-5000), "-50.00");
        assert_eq!(format_paise(-1), "-0.01");
    }

    #[test]
    fn test_format_rupees_drops_sign() {
        assert_eq!(format_rupees(-50000), "₹500.00");
        assert_eq!(format_rupees(120000), "₹1200.00");
    }

    #[test]
    fn test_parse_paise() {
        assert_eq!(parse_paise("50.00"), Ok(5000));
        assert_eq!(parse_paise("50"), Ok(5000));
        assert_eq!(parse_paise("12.5"), Ok(1250));
        assert_eq!(parse_paise(".50"), Ok(50));
        assert_eq!(parse_paise(" -500 "), Ok(-50000));
        assert_eq!(parse_paise("7."), Ok(700));
    }

    #[test]
    fn test_parse_paise_rejects_garbage() {
        assert!(parse_paise("abc").is_err());
        assert!(parse_paise("12.34.56").is_err());
        assert!(parse_paise("").is_err());
        assert!(parse_paise("NaN").is_err());
        assert!(parse_paise("inf").is_err());
        assert!(parse_paise("1e3").is_err());
        assert!(parse_paise(".").is_err());
        assert!(parse_paise("-").is_err());
        assert!(parse_paise("--5").is_err());
        assert!(parse_paise("-+5").is_err());
        assert_eq!(
            parse_paise("99999999999999999999"),
            Err(ParseAmountError::InvalidFormat("99999999999999999999".into()))
        );
        assert_eq!(
            parse_paise("922337203685477580"),
            Err(ParseAmountError::OutOfRange)
        );
    }

    #[test]
    fn test_paise_from_f64() {
        assert_eq!(paise_from_f64(12.5), Ok(1250));
        assert_eq!(paise_from_f64(0.125), Ok(13));
        assert_eq!(paise_from_f64(-0.5), Ok(-50));
        assert_eq!(paise_from_f64(f64::NAN), Err(ParseAmountError::NotFinite));
        assert_eq!(
            paise_from_f64(f64::INFINITY),
            Err(ParseAmountError::NotFinite)
        );
        assert_eq!(paise_from_f64(1e30), Err(ParseAmountError::OutOfRange));
    }

    #[test]
    fn test_extra_decimals_are_rejected_not_truncated() {
        assert_eq!(
            parse_paise("12.999"),
            Err(ParseAmountError::TooManyDecimals("12.999".into()))
        );
        assert_eq!(
            parse_paise("-0.001"),
            Err(ParseAmountError::TooManyDecimals("-0.001".into()))
        );
        assert_eq!(parse_paise("12.99"), Ok(1299));
    }

    #[test]
    fn test_f64_upper_bound() {
        // 2^63 paise does not fit in an i64
        assert_eq!(
            paise_from_f64(92_233_720_368_547_758.08),
            Err(ParseAmountError::OutOfRange)
        );
        assert_eq!(
            paise_from_f64(-92_233_720_368_547_758.08),
            Ok(i64::MIN)
        );
        assert_eq!(paise_from_f64(1_000_000.0), Ok(100_000_000));
    }
}
