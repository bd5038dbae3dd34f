//! Display formatting for report tables.
//!
//! Money is rendered in the same `$1,234.50` shape the loader accepts, so a
//! formatted amount parses back to the same value.

use rust_decimal::Decimal;

/// Format an integer count with thousands separators.
///
/// ```
/// use guard_core::formatting::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(60_000), "60,000");
/// ```
pub fn format_count(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// ```
/// use guard_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.prec$}", value.abs(), prec = decimals);
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::new();
    // Only keep the sign when something non-zero survives rounding.
    if value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Format a dollar amount with two decimal places: `$1,234.56`, `-$9.99`.
pub fn format_currency(amount: f64) -> String {
    with_dollar_sign(format_number(amount, 2))
}

/// Format a dollar amount rounded to whole dollars: `$1,235`.
pub fn format_currency_whole(amount: f64) -> String {
    with_dollar_sign(format_number(amount, 0))
}

/// Format an exact decimal amount with two decimal places.
///
/// ```
/// use std::str::FromStr;
/// use rust_decimal::Decimal;
/// use guard_core::formatting::format_money;
///
/// assert_eq!(format_money(Decimal::from_str("1234.5").unwrap()), "$1,234.50");
/// assert_eq!(format_money(Decimal::from_str("-77").unwrap()), "-$77.00");
/// ```
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let body = format!("${}.{}", group_thousands(int_part), frac_part);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{body}")
    } else {
        body
    }
}

/// Format a `[0, 1]` ratio as a percentage; `None` renders as `n/a`.
///
/// ```
/// use guard_core::formatting::format_rate;
///
/// assert_eq!(format_rate(Some(0.1234)), "12.34%");
/// assert_eq!(format_rate(None), "n/a");
/// ```
pub fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(r) => format!("{:.2}%", r * 100.0),
        None => "n/a".to_string(),
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn with_dollar_sign(number: String) -> String {
    match number.strip_prefix('-') {
        Some(abs) => format!("-${abs}"),
        None => format!("${number}"),
    }
}

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(5), "5");
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn test_format_number_zero() {
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_number(0.0, 2), "0.00");
    }

    #[test]
    fn test_format_number_with_thousands() {
        assert_eq!(format_number(1_234.5, 1), "1,234.5");
        assert_eq!(format_number(123.456, 2), "123.46");
    }

    #[test]
    fn test_format_number_negative_rounding_to_zero_drops_sign() {
        assert_eq!(format_number(-0.001, 2), "0.00");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(1_234.56), "$1,234.56");
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(-9.99), "-$9.99");
        assert_eq!(format_currency(1_000_000.0), "$1,000,000.00");
    }

    #[test]
    fn test_format_currency_whole() {
        assert_eq!(format_currency_whole(1_234.56), "$1,235");
        assert_eq!(format_currency_whole(-12.0), "-$12");
    }

    #[test]
    fn test_format_money_pads_scale() {
        assert_eq!(format_money(Decimal::from_str("0.5").unwrap()), "$0.50");
        assert_eq!(
            format_money(Decimal::from_str("24295").unwrap()),
            "$24,295.00"
        );
    }

    #[test]
    fn test_format_money_negative() {
        assert_eq!(
            format_money(Decimal::from_str("-1234.5").unwrap()),
            "-$1,234.50"
        );
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(Some(0.0)), "0.00%");
        assert_eq!(format_rate(Some(1.0)), "100.00%");
        assert_eq!(format_rate(None), "n/a");
    }
}
