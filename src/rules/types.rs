//! Type and format rules.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use serde_json::Value;

use super::{require_param, Rule, RuleContext};
use crate::coerce::{self, to_plain_string};
use crate::error::ConfigError;

type Built = Result<Arc<dyn Rule>, ConfigError>;

static EMAIL_REGEX: Lazy<regex::Regex> = Lazy::new(|| {
    regex::Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("email pattern compiles")
});

/// A rule that only inspects the shape of the value.
#[derive(Debug)]
struct TypeCheck {
    name: &'static str,
    template: &'static str,
    check: fn(&Value) -> bool,
}

impl Rule for TypeCheck {
    fn name(&self) -> &'static str {
        self.name
    }

    fn passes(&self, cx: &RuleContext<'_>) -> bool {
        cx.value.is_some_and(self.check)
    }

    fn message(&self, cx: &RuleContext<'_>) -> String {
        cx.format(self.template, &[&cx.label()])
    }
}

fn type_check(name: &'static str, template: &'static str, check: fn(&Value) -> bool) -> Built {
    Ok(Arc::new(TypeCheck {
        name,
        template,
        check,
    }))
}

pub(super) fn string(_: Option<&str>) -> Built {
    type_check("string", "The {0} must be a string.", Value::is_string)
}

pub(super) fn number(_: Option<&str>) -> Built {
    type_check("number", "The {0} must be a number.", |v| {
        coerce::to_number(v).is_some()
    })
}

pub(super) fn integer(_: Option<&str>) -> Built {
    type_check("integer", "The {0} must be an integer.", |v| {
        coerce::to_integer(v).is_some()
    })
}

pub(super) fn float(_: Option<&str>) -> Built {
    type_check("float", "The {0} must be a decimal number.", |v| {
        coerce::to_number(v).is_some()
    })
}

pub(super) fn boolean(_: Option<&str>) -> Built {
    type_check("boolean", "The {0} field must be true or false.", |v| {
        coerce::to_bool(v).is_some()
    })
}

pub(super) fn array(_: Option<&str>) -> Built {
    type_check("array", "The {0} must be a list.", Value::is_array)
}

pub(super) fn object(_: Option<&str>) -> Built {
    type_check("object", "The {0} must be an object.", Value::is_object)
}

pub(super) fn email(_: Option<&str>) -> Built {
    type_check("email", "The {0} must be a valid email address.", |v| {
        v.as_str().is_some_and(|s| EMAIL_REGEX.is_match(s.trim()))
    })
}

pub(super) fn url(_: Option<&str>) -> Built {
    type_check("url", "The {0} must be a valid URL.", |v| {
        v.as_str()
            .and_then(|s| url::Url::parse(s.trim()).ok())
            .is_some_and(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
    })
}

pub(super) fn date(_: Option<&str>) -> Built {
    type_check("date", "The {0} is not a valid date.", |v| {
        coerce::to_datetime(v).is_some()
    })
}

#[derive(Debug)]
struct Pattern {
    regex: regex::Regex,
}

impl Rule for Pattern {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn passes(&self, cx: &RuleContext<'_>) -> bool {
        match cx.value {
            Some(v @ (Value::String(_) | Value::Number(_))) => {
                self.regex.is_match(&to_plain_string(v))
            }
            _ => false,
        }
    }

    fn message(&self, cx: &RuleContext<'_>) -> String {
        cx.format("The {0} format is invalid.", &[&cx.label()])
    }
}

/// Accepts `/pattern/flags` or a bare pattern. Flags `i`, `m`, `s`, `x`
/// become an inline group; `u` is implied.
fn delimited(raw: &str) -> Result<String, ConfigError> {
    let Some(body) = raw.strip_prefix('/') else {
        return Ok(raw.to_string());
    };
    let Some(end) = body.rfind('/') else {
        return Err(ConfigError::malformed("regex", raw, "missing closing delimiter"));
    };
    let (pattern, flags) = (&body[..end], &body[end + 1..]);
    let mut inline = String::new();
    for flag in flags.chars() {
        match flag {
            'i' | 'm' | 's' | 'x' => inline.push(flag),
            'u' => {}
            other => {
                return Err(ConfigError::malformed(
                    "regex",
                    raw,
                    format!("unsupported flag `{other}`"),
                ))
            }
        }
    }
    if inline.is_empty() {
        Ok(pattern.to_string())
    } else {
        Ok(format!("(?{inline}){pattern}"))
    }
}

pub(super) fn regex(param: Option<&str>) -> Built {
    let raw = require_param("regex", param)?;
    let source = delimited(raw)?;
    let regex = regex::Regex::new(&source).map_err(|e| {
        tracing::warn!(pattern = raw, "regex rule does not compile");
        ConfigError::InvalidRegex {
            pattern: raw.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(Arc::new(Pattern { regex }))
}

#[derive(Debug)]
struct DateFormat {
    /// `None` falls back to the configured `date_format`.
    declared: Option<String>,
}

impl DateFormat {
    fn format<'c>(&'c self, cx: &'c RuleContext<'_>) -> &'c str {
        self.declared
            .as_deref()
            .unwrap_or(cx.services.config().date_format.as_str())
    }
}

fn matches_format(raw: &str, strftime: &str) -> bool {
    NaiveDateTime::parse_from_str(raw, strftime).is_ok()
        || NaiveDate::parse_from_str(raw, strftime).is_ok()
        || NaiveTime::parse_from_str(raw, strftime).is_ok()
}

impl Rule for DateFormat {
    fn name(&self) -> &'static str {
        "date_format"
    }

    fn passes(&self, cx: &RuleContext<'_>) -> bool {
        let strftime = coerce::to_strftime(self.format(cx));
        cx.value
            .and_then(Value::as_str)
            .is_some_and(|raw| matches_format(raw.trim(), &strftime))
    }

    fn message(&self, cx: &RuleContext<'_>) -> String {
        cx.format(
            "The {0} does not match the format {1}.",
            &[cx.label().as_str(), self.format(cx)],
        )
    }
}

pub(super) fn date_format(param: Option<&str>) -> Built {
    let declared = param.map(str::trim).filter(|p| !p.is_empty());
    Ok(Arc::new(DateFormat {
        declared: declared.map(str::to_string),
    }))
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::error::ConfigError;
    use crate::rules::testing::{check, check_with, message};
    use crate::rules::RuleRegistry;
    use crate::services::Services;
    use serde_json::json;

    fn ok(token: &str, value: serde_json::Value) -> bool {
        check(token, &json!({ "f": value }), "f", &[])
    }

    #[test]
    fn scalar_types() {
        assert!(ok("string", json!("x")));
        assert!(!ok("string", json!(1)));
        assert!(ok("number", json!("12.5")));
        assert!(!ok("number", json!("twelve")));
        assert!(ok("integer", json!(3)));
        assert!(ok("integer", json!("3")));
        assert!(!ok("integer", json!(3.5)));
        assert!(ok("float", json!(3.5)));
        assert!(ok("boolean", json!("1")));
        assert!(!ok("boolean", json!("yes please")));
        assert!(ok("array", json!([1])));
        assert!(!ok("array", json!({"a": 1})));
        assert!(ok("object", json!({"a": 1})));
    }

    #[test]
    fn email_and_url() {
        assert!(ok("email", json!("ada@example.com")));
        assert!(!ok("email", json!("ada@")));
        assert!(!ok("email", json!("not an email")));
        assert!(ok("url", json!("https://example.com/campaign?id=1")));
        assert!(!ok("url", json!("javascript:alert(1)")));
        assert!(!ok("url", json!("example.com")));
    }

    #[test]
    fn regex_with_delimiters_and_flags() {
        assert!(ok("regex:/^[a-z]+$/", json!("abc")));
        assert!(!ok("regex:/^[a-z]+$/", json!("ABC")));
        assert!(ok("regex:/^[a-z]+$/i", json!("ABC")));
        assert!(ok("regex:^\\d{2}:\\d{2}$", json!("10:30")));
        assert!(ok("regex:^\\d+$", json!(42)));
        assert!(!ok("regex:^\\d+$", json!([42])));
    }

    #[test]
    fn broken_regex_is_a_config_error() {
        let registry = RuleRegistry::default();
        assert!(matches!(
            registry.resolve("regex:/(unclosed/"),
            Err(ConfigError::InvalidRegex { .. })
        ));
        assert!(matches!(
            registry.resolve("regex:/abc/q"),
            Err(ConfigError::MalformedParameter { .. })
        ));
        assert!(matches!(
            registry.resolve("regex"),
            Err(ConfigError::MissingParameter { .. })
        ));
    }

    #[test]
    fn dates_and_formats() {
        assert!(ok("date", json!("2024-02-29")));
        assert!(!ok("date", json!("2023-02-29")));
        assert!(ok("date_format:Y-m-d", json!("2024-05-01")));
        assert!(!ok("date_format:Y-m-d", json!("01/05/2024")));
        assert!(ok("date_format:%d/%m/%Y", json!("01/05/2024")));
        assert!(ok("date_format:H:i", json!("09:15")));
    }

    #[test]
    fn date_format_without_a_format_uses_the_configured_one() {
        assert!(ok("date_format", json!("2024-05-01")));
        assert!(!ok("date_format", json!("01/05/2024")));

        let services = Services::new(EngineConfig {
            date_format: "%d/%m/%Y".into(),
            ..Default::default()
        });
        let payload = json!({"f": "01/05/2024"});
        assert!(check_with(&services, "date_format", &payload, "f", &[]));
        assert!(!check_with(&services, "date_format", &json!({"f": "2024-05-01"}), "f", &[]));
        assert_eq!(
            message("date_format", &json!({"start_date": "x"}), "start_date"),
            "The start date does not match the format %Y-%m-%d."
        );
    }

    #[test]
    fn date_format_message_shows_declared_format() {
        assert_eq!(
            message("date_format:Y-m-d", &json!({"start_date": "x"}), "start_date"),
            "The start date does not match the format Y-m-d."
        );
    }
}
