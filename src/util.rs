// Parsing and formatting helpers.
//
// All the forgiving cell handling for the exports lives here so the loader
// can work with typed values, and all number rendering lives here so the
// output adapter stays consistent.
use crate::types::MetricValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

/// True when the cell is missing or only whitespace.
pub fn is_blank(s: Option<&str>) -> bool {
    s.map_or(true, |v| v.trim().is_empty())
}

/// Parse a money/count cell.
///
/// - Trims whitespace and strips `$` and thousands separators.
/// - Rejects anything containing letters.
/// - Returns `None` for empty or unparseable input.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() || s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let cleaned: String = s.chars().filter(|c| *c != ',' && *c != '$').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a calendar date from the formats seen across export years.
/// Timestamps are truncated to their date.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(d) = DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
    {
        return Some(d);
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
    {
        return Some(dt.date());
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

pub fn parse_bool_safe(s: Option<&str>) -> bool {
    matches!(
        s.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes" | "y")
    )
}

/// Arithmetic mean; undefined for an empty slice.
pub fn average(v: &[f64]) -> MetricValue {
    let sum: f64 = v.iter().sum();
    MetricValue::ratio(sum, v.len() as f64)
}

/// Fixed decimals with locale thousands separators, e.g. `1,234,567.89`.
pub fn format_number(n: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, n.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };
    // Past u64 range the digits are kept without separators.
    let mut res = match int_part.parse::<u64>() {
        Ok(v) => v.to_formatted_string(&Locale::en),
        Err(_) => int_part.to_string(),
    };
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    // Avoid rendering "-0.00".
    if n.is_sign_negative() && res.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

pub fn format_metric(v: MetricValue, decimals: usize) -> String {
    match v {
        MetricValue::Defined(n) => format_number(n, decimals),
        MetricValue::Undefined => "n/a".to_string(),
    }
}

/// Signed percentage such as `+23.20%`; the sentinel renders as `undefined`.
pub fn format_percent(v: MetricValue) -> String {
    match v {
        MetricValue::Defined(n) if n >= 0.0 => format!("+{}%", format_number(n, 2)),
        MetricValue::Defined(n) => format!("{}%", format_number(n, 2)),
        MetricValue::Undefined => "undefined".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_f64_safe_strips_currency_and_separators() {
        assert_eq!(parse_f64_safe(Some(" $1,234.50 ")), Some(1234.5));
        assert_eq!(parse_f64_safe(Some("-12.5")), Some(-12.5));
        assert_eq!(parse_f64_safe(Some("abc")), None);
        assert_eq!(parse_f64_safe(Some("")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn test_parse_date_safe_formats() {
        let d = NaiveDate::from_ymd_opt(2025, 7, 9).unwrap();
        assert_eq!(parse_date_safe(Some("2025-07-09")), Some(d));
        assert_eq!(parse_date_safe(Some("07/09/2025")), Some(d));
        assert_eq!(parse_date_safe(Some("2025-07-09 23:15:00")), Some(d));
        assert_eq!(parse_date_safe(Some("2025-07-09T23:15:00Z")), Some(d));
        assert_eq!(parse_date_safe(Some("not a date")), None);
        assert_eq!(parse_date_safe(Some("  ")), None);
    }

    #[test]
    fn test_parse_bool_safe() {
        assert!(parse_bool_safe(Some("TRUE")));
        assert!(parse_bool_safe(Some("true")));
        assert!(!parse_bool_safe(Some("FALSE")));
        assert!(!parse_bool_safe(None));
    }

    #[test]
    fn test_average_empty_is_undefined() {
        assert!(average(&[]).is_undefined());
        assert_eq!(average(&[1.0, 2.0, 3.0]), MetricValue::Defined(2.0));
    }

    #[test]
    fn test_format_number_and_percent() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-1500.0, 0), "-1,500");
        assert_eq!(format_number(-0.001, 2), "0.00");
        assert_eq!(format_percent(MetricValue::Defined(23.2)), "+23.20%");
        assert_eq!(format_percent(MetricValue::Defined(-4.0)), "-4.00%");
        assert_eq!(format_percent(MetricValue::Undefined), "undefined");
    }

    #[test]
    fn test_format_number_beyond_u64_keeps_digits() {
        assert_eq!(format_number(2e19, 2), "20000000000000000000.00");
        assert_eq!(format_number(-2e19, 0), "-20000000000000000000");
        assert_eq!(format_number(18_000_000_000_000_000_000.0, 0), "18,000,000,000,000,000,000");
    }
}
