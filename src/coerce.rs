//! Type normalization shared by rules, sanitizers and casts.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Returns true for absent, `null`, blank strings and empty arrays or objects.
///
/// This is the emptiness test behind `required` and the null-skip policy.
pub fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::Bool(_) | Value::Number(_)) => false,
    }
}

/// Reads a number from a JSON number or a numeric string.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Reads an integer from a JSON integer or an integer string.
pub fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Reads a money amount, ignoring currency symbols and thousands
/// separators (`"$1,234.50"`).
pub fn to_amount(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => {
            let digits: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
                .collect();
            digits.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        other => to_number(other),
    }
}

/// Reads a boolean the way HTML forms send them.
pub fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Some(true),
            "0" | "false" | "off" | "no" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parses a date or date-time string.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and
/// `YYYY-MM-DD` (at midnight).
pub fn to_datetime(value: &Value) -> Option<NaiveDateTime> {
    let raw = value.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Renders a scalar the way it would appear in a rule parameter.
pub fn to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Turns a literal from a rule parameter into a typed value.
///
/// `true`, `false` and `null` become their JSON equivalents so that
/// `required_if:has_goal,true` matches a boolean sibling. Everything else
/// stays a string.
pub fn parse_literal(raw: &str) -> Value {
    match raw.trim() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        other => Value::String(other.to_string()),
    }
}

/// Translates a short date format (`Y-m-d H:i:s`) into strftime.
///
/// Formats already containing `%` are returned unchanged.
pub fn to_strftime(format: &str) -> String {
    if format.contains('%') {
        return format.to_string();
    }
    let mut out = String::with_capacity(format.len() * 2);
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        match c {
            'Y' => out.push_str("%Y"),
            'y' => out.push_str("%y"),
            'm' => out.push_str("%m"),
            'n' => out.push_str("%-m"),
            'd' => out.push_str("%d"),
            'j' => out.push_str("%-d"),
            'H' => out.push_str("%H"),
            'G' => out.push_str("%-H"),
            'i' => out.push_str("%M"),
            's' => out.push_str("%S"),
            'A' => out.push_str("%p"),
            'M' => out.push_str("%b"),
            'F' => out.push_str("%B"),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn emptiness() {
        assert!(is_empty(None));
        assert!(is_empty(Some(&json!(null))));
        assert!(is_empty(Some(&json!("  "))));
        assert!(is_empty(Some(&json!([]))));
        assert!(is_empty(Some(&json!({}))));
        assert!(!is_empty(Some(&json!(0))));
        assert!(!is_empty(Some(&json!(false))));
        assert!(!is_empty(Some(&json!("0"))));
    }

    #[test]
    fn numbers_from_strings() {
        assert_eq!(to_number(&json!("10.5")), Some(10.5));
        assert_eq!(to_number(&json!(" 7 ")), Some(7.0));
        assert_eq!(to_number(&json!("ten")), None);
        assert_eq!(to_number(&json!("NaN")), None);
        assert_eq!(to_integer(&json!("42")), Some(42));
        assert_eq!(to_integer(&json!("4.2")), None);
    }

    #[test]
    fn amounts_ignore_symbols_and_separators() {
        assert_eq!(to_amount(&json!("$1,234.50")), Some(1234.5));
        assert_eq!(to_amount(&json!(12)), Some(12.0));
        assert_eq!(to_amount(&json!("free")), None);
    }

    #[test]
    fn form_booleans() {
        assert_eq!(to_bool(&json!("on")), Some(true));
        assert_eq!(to_bool(&json!(0)), Some(false));
        assert_eq!(to_bool(&json!("maybe")), None);
        assert_eq!(to_bool(&json!(2)), None);
    }

    #[test]
    fn dates_in_common_shapes() {
        let midnight = to_datetime(&json!("2024-05-01")).unwrap();
        let later = to_datetime(&json!("2024-05-01 10:30:00")).unwrap();
        let rfc = to_datetime(&json!("2024-05-01T12:00:00+02:00")).unwrap();
        assert!(midnight < later);
        assert_eq!(rfc, to_datetime(&json!("2024-05-01 10:00:00")).unwrap());
        assert!(to_datetime(&json!("01/05/2024")).is_none());
        assert!(to_datetime(&json!(20240501)).is_none());
    }

    #[test]
    fn literals() {
        assert_eq!(parse_literal("true"), json!(true));
        assert_eq!(parse_literal("null"), json!(null));
        assert_eq!(parse_literal("published"), json!("published"));
    }

    #[test]
    fn short_date_formats() {
        assert_eq!(to_strftime("Y-m-d"), "%Y-%m-%d");
        assert_eq!(to_strftime("Y-m-d H:i:s"), "%Y-%m-%d %H:%M:%S");
        assert_eq!(to_strftime("%d/%m/%Y"), "%d/%m/%Y");
        assert_eq!(to_strftime("\\Y Y"), "Y %Y");
    }
}
