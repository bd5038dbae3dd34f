//! Value coercion from raw source strings into typed [`FieldValue`]s.
//!
//! The functions here only classify a raw string; whether an empty or
//! unparseable value drops the row, fails the window, or becomes absent is
//! decided by the column's [`Requirement`](crate::schema::Requirement) in the
//! normalizer.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::models::FieldValue;
use crate::schema::ColumnKind;

/// Raw values treated as `false` by [`parse_flag`] (compared lowercase).
const FALSY_FLAGS: &[&str] = &[
    "", "0", "false", "f", "no", "n", "off", "none", "null", "nan",
];

/// Date-time layouts tried in order by [`parse_timestamp`].
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Date-only layouts tried in order by [`parse_date`].
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%b-%Y", "%Y%m%d"];

/// Result of coercing one raw field.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    /// The raw value parsed into its target type.
    Value(FieldValue),
    /// The raw value was empty after trimming.
    Empty,
    /// The raw value was present but could not be parsed.
    Rejected { expected: &'static str },
}

/// Coerce a raw field into the representation required by `kind`.
///
/// Flags never come back `Empty` or `Rejected`: they are always two-valued.
pub fn coerce(kind: ColumnKind, raw: &str) -> Coerced {
    if kind == ColumnKind::Flag {
        return Coerced::Value(FieldValue::Flag(Some(parse_flag(raw))));
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Coerced::Empty;
    }

    let parsed = match kind {
        ColumnKind::Text => Some(FieldValue::Text(Some(trimmed.to_string()))),
        ColumnKind::Integer => parse_integer(trimmed).map(|v| FieldValue::Integer(Some(v))),
        ColumnKind::Float => parse_float(trimmed).map(|v| FieldValue::Float(Some(v))),
        ColumnKind::Currency => parse_currency(trimmed).map(|v| FieldValue::Decimal(Some(v))),
        ColumnKind::Date => parse_date(trimmed).map(|v| FieldValue::Date(Some(v))),
        ColumnKind::Timestamp => parse_timestamp(trimmed).map(|v| FieldValue::Timestamp(Some(v))),
        ColumnKind::Flag => Some(FieldValue::Flag(Some(parse_flag(trimmed)))),
    };

    match parsed {
        Some(value) => Coerced::Value(value),
        None => Coerced::Rejected {
            expected: kind.describe(),
        },
    }
}

/// Parse a money string such as `"$1,234.50"`, `"-$77.00"` or `"12.5"`.
///
/// Strips every `$` and `,`, trims, parses as a decimal and rounds half away
/// from zero to two places.
pub fn parse_currency(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.chars().filter(|c| *c != '$' && *c != ',').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    let value = Decimal::from_str(cleaned)
        .or_else(|_| Decimal::from_scientific(cleaned))
        .ok()?;

    Some(value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero))
}

/// Two-valued flag parsing: anything non-empty and not zero-like is `true`.
pub fn parse_flag(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    if FALSY_FLAGS.contains(&lowered.as_str()) {
        return false;
    }
    // "0.0", "0.00", "-0" and friends.
    !matches!(lowered.parse::<f64>(), Ok(v) if v == 0.0)
}

/// Parse an integer, accepting integral float spellings such as `"5.0"`.
pub fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    let f = trimmed.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Parse a finite floating-point number.
pub fn parse_float(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Permissive calendar-date parsing.
///
/// Accepts date-only layouts, any layout [`parse_timestamp`] accepts (the
/// time part is discarded) and month-only layouts (`MM/YYYY`, `YYYY-MM`),
/// which resolve to the first day of the month.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }

    if let Some(ts) = parse_datetime_only(s) {
        return Some(ts.date());
    }

    parse_month(s)
}

/// Permissive timestamp parsing. Date-only values resolve to midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(ts) = parse_datetime_only(s) {
        return Some(ts);
    }

    parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn parse_datetime_only(s: &str) -> Option<NaiveDateTime> {
    // RFC 3339 with an explicit offset (including a trailing `Z`).
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// `MM/YYYY` or `YYYY-MM` → first day of that month.
fn parse_month(s: &str) -> Option<NaiveDate> {
    let (year, month) = if let Some((m, y)) = s.split_once('/') {
        (y, m)
    } else if let Some((y, m)) = s.split_once('-') {
        (y, m)
    } else {
        return None;
    };

    if year.len() != 4 || month.is_empty() || month.len() > 2 {
        return None;
    }

    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    // ── parse_currency ────────────────────────────────────────────────────────

    #[test]
    fn test_currency_plain_number() {
        assert_eq!(parse_currency("12.5"), Some(dec("12.50")));
        assert_eq!(parse_currency("0"), Some(dec("0")));
    }

    #[test]
    fn test_currency_symbol_and_separators() {
        assert_eq!(parse_currency("$1,234.50"), Some(dec("1234.50")));
        assert_eq!(parse_currency("  $24,295  "), Some(dec("24295")));
        assert_eq!(parse_currency("$1,000,000.01"), Some(dec("1000000.01")));
    }

    #[test]
    fn test_currency_negative_amount() {
        assert_eq!(parse_currency("-$77.00"), Some(dec("-77.00")));
    }

    #[test]
    fn test_currency_rounds_to_two_places() {
        assert_eq!(parse_currency("$10.005"), Some(dec("10.01")));
        assert_eq!(parse_currency("3.14159"), Some(dec("3.14")));
    }

    #[test]
    fn test_currency_rejects_garbage() {
        assert_eq!(parse_currency("$"), None);
        assert_eq!(parse_currency("twelve"), None);
        assert_eq!(parse_currency("$12.x"), None);
        assert_eq!(parse_currency(""), None);
    }

    #[test]
    fn test_currency_round_trip_with_formatter() {
        for raw in ["0.01", "1.10", "999.99", "1234.50", "1000000.00", "59696.38"] {
            let value = dec(raw);
            let formatted = crate::formatting::format_money(value);
            assert_eq!(parse_currency(&formatted), Some(value), "{formatted}");
        }
    }

    // ── parse_flag ────────────────────────────────────────────────────────────

    #[test]
    fn test_flag_truthy_values() {
        for raw in ["YES", "1", "true", "Chip Transaction", "Swipe Transaction", "x"] {
            assert!(parse_flag(raw), "{raw} should be truthy");
        }
    }

    #[test]
    fn test_flag_zero_like_values() {
        for raw in ["", "  ", "0", "0.0", "False", "NO", "No", "n", "off", "None", "null", "NaN"] {
            assert!(!parse_flag(raw), "{raw:?} should be falsy");
        }
    }

    // ── parse_integer / parse_float ───────────────────────────────────────────

    #[test]
    fn test_integer_accepts_integral_floats() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer(" 5411 "), Some(5411));
        assert_eq!(parse_integer("60614.0"), Some(60614));
        assert_eq!(parse_integer("1.5"), None);
        assert_eq!(parse_integer("abc"), None);
    }

    #[test]
    fn test_float_rejects_non_finite() {
        assert_eq!(parse_float("34.15"), Some(34.15));
        assert_eq!(parse_float("inf"), None);
        assert_eq!(parse_float("NaN"), None);
    }

    // ── parse_date / parse_timestamp ──────────────────────────────────────────

    #[test]
    fn test_date_iso_and_us_layouts() {
        let expected = NaiveDate::from_ymd_opt(2002, 9, 15);
        assert_eq!(parse_date("2002-09-15"), expected);
        assert_eq!(parse_date("09/15/2002"), expected);
        assert_eq!(parse_date("2002/09/15"), expected);
    }

    #[test]
    fn test_date_month_only_layouts() {
        assert_eq!(parse_date("12/2022"), NaiveDate::from_ymd_opt(2022, 12, 1));
        assert_eq!(parse_date("09/2002"), NaiveDate::from_ymd_opt(2002, 9, 1));
        assert_eq!(parse_date("2022-12"), NaiveDate::from_ymd_opt(2022, 12, 1));
    }

    #[test]
    fn test_date_from_timestamp_text() {
        assert_eq!(
            parse_date("2010-01-01 00:01:00"),
            NaiveDate::from_ymd_opt(2010, 1, 1)
        );
    }

    #[test]
    fn test_date_unparseable_is_absent() {
        assert_eq!(parse_date("13/2022"), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2022-02-30"), None);
    }

    #[test]
    fn test_timestamp_layouts() {
        let expected = NaiveDate::from_ymd_opt(2010, 1, 1)
            .unwrap()
            .and_hms_opt(0, 1, 0);
        assert_eq!(parse_timestamp("2010-01-01 00:01:00"), expected);
        assert_eq!(parse_timestamp("2010-01-01T00:01:00"), expected);
        assert_eq!(parse_timestamp("2010-01-01T00:01:00Z"), expected);
    }

    #[test]
    fn test_timestamp_date_only_is_midnight() {
        assert_eq!(
            parse_timestamp("2010-01-01"),
            NaiveDate::from_ymd_opt(2010, 1, 1).unwrap().and_hms_opt(0, 0, 0)
        );
    }

    // ── coerce ────────────────────────────────────────────────────────────────

    #[test]
    fn test_coerce_empty_is_empty() {
        assert_eq!(coerce(ColumnKind::Integer, "  "), Coerced::Empty);
        assert_eq!(coerce(ColumnKind::Currency, ""), Coerced::Empty);
        assert_eq!(coerce(ColumnKind::Text, ""), Coerced::Empty);
    }

    #[test]
    fn test_coerce_flag_never_empty() {
        assert_eq!(
            coerce(ColumnKind::Flag, ""),
            Coerced::Value(FieldValue::Flag(Some(false)))
        );
        assert_eq!(
            coerce(ColumnKind::Flag, "YES"),
            Coerced::Value(FieldValue::Flag(Some(true)))
        );
    }

    #[test]
    fn test_coerce_rejected_names_expected_type() {
        assert_eq!(
            coerce(ColumnKind::Currency, "$abc"),
            Coerced::Rejected {
                expected: "currency amount"
            }
        );
        assert_eq!(
            coerce(ColumnKind::Date, "soon"),
            Coerced::Rejected { expected: "date" }
        );
    }

    #[test]
    fn test_coerce_text_is_trimmed() {
        assert_eq!(
            coerce(ColumnKind::Text, "  Insufficient Balance "),
            Coerced::Value(FieldValue::Text(Some("Insufficient Balance".to_string())))
        );
    }
}
