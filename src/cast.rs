//! Typed transfer objects built from verified payloads.
//!
//! A [`CastSpec`] normalizes primitive values in place (money strings to
//! minor units, loose dates to ISO dates, form booleans to booleans) and
//! fills declared defaults. [`TransferObject::from_verified`] applies a
//! type's spec and hands the result to `serde`.
//!
//! Casting never validates. It assumes the [`Validator`](crate::Validator)
//! already accepted the payload, and maps anything it cannot read to `null`.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::coerce::{to_amount, to_bool, to_datetime, to_integer, to_number, to_plain_string};
use crate::config::EngineConfig;
use crate::path;
use crate::Verified;

type CastFn = dyn Fn(&Value, &Value) -> Value + Send + Sync;

/// How one field is converted.
#[derive(Clone)]
pub enum Cast {
    /// Integer, truncating decimals.
    Integer,
    /// Floating point number.
    Float,
    /// Form-style boolean.
    Boolean,
    /// Integer minor units, using the sibling currency's decimals.
    Money,
    /// Date rendered with [`EngineConfig::date_format`].
    Date,
    /// Date-time rendered as `YYYY-MM-DDTHH:MM:SS`.
    DateTime,
    /// Plain string.
    Str,
    /// One of `allowed`, or `default` for anything else.
    Enumeration {
        /// Accepted values.
        allowed: Vec<String>,
        /// Replacement for values outside `allowed`.
        default: Option<String>,
    },
    /// A function of `(raw, record)`; `record` is the node holding the field.
    Custom(Arc<CastFn>),
}

impl Cast {
    /// Shorthand for [`Cast::Enumeration`].
    pub fn enumeration(allowed: &[&str], default: Option<&str>) -> Self {
        Cast::Enumeration {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
            default: default.map(String::from),
        }
    }

    /// Wraps a closure.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Value + Send + Sync + 'static,
    {
        Cast::Custom(Arc::new(f))
    }

    fn apply(&self, raw: &Value, record: &Value, config: &EngineConfig) -> Value {
        if let Cast::Custom(f) = self {
            return f(raw, record);
        }
        if raw.is_null() {
            return match self {
                Cast::Enumeration { default, .. } => default.clone().map_or(Value::Null, Value::String),
                _ => Value::Null,
            };
        }
        match self {
            Cast::Integer => to_integer(raw)
                .or_else(|| to_number(raw).map(|n| n.trunc() as i64))
                .map_or(Value::Null, Value::from),
            Cast::Float => to_number(raw).map_or(Value::Null, Value::from),
            Cast::Boolean => to_bool(raw).map_or(Value::Null, Value::Bool),
            Cast::Money => {
                let currency = record.get(&config.currency_field).and_then(Value::as_str);
                let scale = 10f64.powi(config.decimals_for(currency) as i32);
                to_amount(raw)
                    .map(|amount| (amount * scale).round() as i64)
                    .map_or(Value::Null, Value::from)
            }
            Cast::Date => parse_date(raw, config)
                .map(|d| Value::String(d.format(&config.date_format).to_string()))
                .unwrap_or(Value::Null),
            Cast::DateTime => to_datetime(raw)
                .map(|dt| Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string()))
                .unwrap_or(Value::Null),
            Cast::Str => Value::String(to_plain_string(raw)),
            Cast::Enumeration { allowed, default } => {
                let candidate = to_plain_string(raw);
                if allowed.contains(&candidate) {
                    Value::String(candidate)
                } else {
                    default.clone().map_or(Value::Null, Value::String)
                }
            }
            Cast::Custom(_) => Value::Null,
        }
    }
}

fn parse_date(raw: &Value, config: &EngineConfig) -> Option<NaiveDate> {
    let configured = raw
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), &config.date_format).ok());
    configured.or_else(|| to_datetime(raw).map(|dt| dt.date()))
}

impl fmt::Debug for Cast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cast::Integer => f.write_str("Integer"),
            Cast::Float => f.write_str("Float"),
            Cast::Boolean => f.write_str("Boolean"),
            Cast::Money => f.write_str("Money"),
            Cast::Date => f.write_str("Date"),
            Cast::DateTime => f.write_str("DateTime"),
            Cast::Str => f.write_str("Str"),
            Cast::Enumeration { allowed, default } => f
                .debug_struct("Enumeration")
                .field("allowed", allowed)
                .field("default", default)
                .finish(),
            Cast::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Casts and defaults for a transfer object, keyed by field path pattern.
///
/// # Examples
///
/// ```
/// use payload_policy::{Cast, CastSpec, EngineConfig};
/// use serde_json::json;
///
/// let spec = CastSpec::new()
///     .cast("goal", Cast::Money)
///     .cast("items.*.qty", Cast::Integer)
///     .with_default("items.*.qty", json!(1))
///     .with_default("status", json!("draft"));
///
/// let mut payload = json!({"goal": "1,500.25", "items": [{"qty": "3"}, {}]});
/// spec.apply(&mut payload, &EngineConfig::default());
///
/// assert_eq!(payload, json!({
///     "goal": 150025,
///     "items": [{"qty": 3}, {"qty": 1}],
///     "status": "draft",
/// }));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CastSpec {
    casts: Vec<(String, Cast)>,
    defaults: Vec<(String, Value)>,
}

impl CastSpec {
    /// An empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Casts every field matching `pattern`.
    pub fn cast(mut self, pattern: impl Into<String>, cast: Cast) -> Self {
        self.casts.push((pattern.into(), cast));
        self
    }

    /// Fills `pattern` with `value` when the field is absent or `null`.
    pub fn with_default(mut self, pattern: impl Into<String>, value: Value) -> Self {
        self.defaults.push((pattern.into(), value));
        self
    }

    /// Applies defaults, then casts, in place.
    pub fn apply(&self, payload: &mut Value, config: &EngineConfig) {
        for (pattern, value) in &self.defaults {
            for key in path::expand(pattern, payload) {
                if path::get(payload, &key).map_or(true, Value::is_null) {
                    path::set(payload, &key, value.clone());
                }
            }
        }
        for (pattern, cast) in &self.casts {
            for key in path::expand(pattern, payload) {
                let Some(raw) = path::get(payload, &key) else {
                    continue;
                };
                let record = match path::parent(&key) {
                    "" => &*payload,
                    parent => path::get(payload, parent).unwrap_or(&Value::Null),
                };
                let typed = cast.apply(raw, record, config);
                path::set(payload, &key, typed);
            }
        }
    }
}

/// Applies `spec` to an owned payload.
pub fn cast(mut payload: Value, spec: &CastSpec, config: &EngineConfig) -> Value {
    spec.apply(&mut payload, config);
    payload
}

/// A verified payload could not be turned into the transfer object.
#[derive(Debug, Error)]
#[error("cannot build transfer object: {0}")]
pub struct CastError(#[from] serde_json::Error);

/// A typed, immutable view of a verified payload.
///
/// Implementors declare their casts; deserialization does the rest.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use payload_policy::{Cast, CastSpec, EngineConfig, TransferObject};
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct Pledge {
///     amount: i64,
///     anonymous: bool,
///     pledged_on: NaiveDate,
/// }
///
/// impl TransferObject for Pledge {
///     fn casts() -> CastSpec {
///         CastSpec::new()
///             .cast("amount", Cast::Money)
///             .cast("anonymous", Cast::Boolean)
///             .cast("pledged_on", Cast::Date)
///             .with_default("anonymous", false.into())
///     }
/// }
/// # let _ = Pledge::casts();
/// ```
pub trait TransferObject: DeserializeOwned {
    /// The casts and defaults for this type.
    fn casts() -> CastSpec {
        CastSpec::new()
    }

    /// Casts a verified payload and deserializes it.
    ///
    /// # Errors
    ///
    /// Returns [`CastError`] when the cast payload does not match the type.
    fn from_verified(payload: Verified<Value>, config: &EngineConfig) -> Result<Self, CastError> {
        let typed = cast(payload.into_inner(), &Self::casts(), config);
        serde_json::from_value(typed).map_err(|err| {
            tracing::debug!(error = %err, "transfer object rejected cast payload");
            CastError::from(err)
        })
    }
}
