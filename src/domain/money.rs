use std::fmt;

/// Money is represented as integer cents to avoid floating-point precision issues.
/// 1 unit = 100 cents, so 70.00 = 7000 cents.
pub type Cents = i64;

/// Largest amount a single transaction may carry: one trillion units.
/// Keeps every sum the ledger computes well inside `i64`.
pub const MAX_AMOUNT: Cents = 100_000_000_000_000;

/// Format cents as a human-readable amount.
/// Example: 7000 -> "70.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.abs();
    let units = abs_cents / 100;
    let remainder = abs_cents % 100;
    format!("{}{}.{:02}", sign, units, remainder)
}

/// Parse a decimal string into cents.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let negative = input.starts_with('-');
    let input = input.trim_start_matches('-');

    let (units_str, decimal_str) = match input.split_once('.') {
        Some((units, decimals)) => (units, decimals),
        None => (input, ""),
    };
    if decimal_str.contains('.') || (units_str.is_empty() && decimal_str.is_empty()) {
        return Err(ParseCentsError::InvalidFormat);
    }
    if !units_str.chars().all(|c| c.is_ascii_digit())
        || !decimal_str.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?
    };

    // Pad or truncate the fractional part to 2 digits
    let decimal_cents: i64 = match decimal_str.len() {
        0 => 0,
        1 => decimal_str[..1]
            .parse::<i64>()
            .map_err(|_| ParseCentsError::InvalidFormat)?
            * 10,
        _ => decimal_str[..2]
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimal_cents))
        .ok_or(ParseCentsError::Overflow)?;
    Ok(if negative { -cents } else { cents })
}

/// Convert a decimal amount in currency units to cents, rounding to the nearest cent.
pub fn cents_from_units(units: f64) -> Option<Cents> {
    let cents = (units * 100.0).round();
    if cents.is_finite() && cents.abs() < i64::MAX as f64 {
        Some(cents as Cents)
    } else {
        None
    }
}

/// Convert cents to a decimal amount in currency units.
pub fn cents_to_units(cents: Cents) -> f64 {
    cents as f64 / 100.0
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    Overflow,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::Overflow => write!(f, "amount is too large"),
        }
    }
}

impl std::error::Error for ParseCentsError {}

/// Serde adapter storing cents as a JSON number in currency units (`70.5`).
pub mod units {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use super::{Cents, MAX_AMOUNT, cents_from_units, cents_to_units};

    pub fn serialize<S: Serializer>(cents: &Cents, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(cents_to_units(*cents))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cents, D::Error> {
        let units = f64::deserialize(deserializer)?;
        cents_from_units(units)
            .filter(|cents| cents.abs() <= MAX_AMOUNT)
            .ok_or_else(|| D::Error::custom("amount out of range"))
    }
}
