//! Pre-validation normalization of request payloads.
//!
//! A [`SanitizationSpec`] maps field path patterns to an ordered list of
//! transforms. Applying it rewrites the values that exist in the payload and
//! leaves everything else alone. Sanitizing never fails at runtime: a value a
//! transform cannot handle is left unchanged for the validator to judge.
//!
//! Every builtin token is idempotent, so sanitizing twice is the same as
//! sanitizing once.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::trace;

use crate::coerce::{to_amount, to_bool, to_integer, to_number};
use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::path;
use crate::Tainted;

static SCRIPT_BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)[^>]*>.*?</(?:script|style)>")
        .expect("script pattern compiles")
});

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern compiles"));

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));

/// Characters a file name may not contain.
const FILE_NAME_SPECIALS: &[char] = &[
    '?', '[', ']', '/', '\\', '=', '<', '>', ':', ';', ',', '\'', '"', '&', '$', '#', '*', '(',
    ')', '|', '~', '`', '!', '{', '}', '%', '+',
];

/// A builtin sanitization token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SanitizeToken {
    /// Trim surrounding whitespace.
    Trim,
    /// Single-line text: drop tags and control characters, collapse
    /// whitespace, trim.
    Text,
    /// Multi-line text: drop tags, normalize line endings, trim.
    Textarea,
    /// Drop characters not allowed in an address; lowercase the domain.
    Email,
    /// Drop whitespace and unsafe characters; default to `http://`.
    Url,
    /// Lowercase `[a-z0-9_-]` identifier.
    Key,
    /// URL slug.
    Title,
    /// Safe file name.
    FileName,
    /// `type/subtype` characters only.
    MimeType,
    /// Coerce to an integer, truncating decimals.
    Int,
    /// Coerce to a float.
    Float,
    /// Coerce form booleans (`"1"`, `"on"`, `"false"`) to booleans.
    Bool,
    /// Round to the minor units of the sibling currency.
    Money,
    /// Wrap a scalar into a list; comma-separated strings are split.
    Array,
}

impl SanitizeToken {
    /// Every token in its written form.
    pub const ALL: &'static [(&'static str, SanitizeToken)] = &[
        ("trim", SanitizeToken::Trim),
        ("text", SanitizeToken::Text),
        ("textarea", SanitizeToken::Textarea),
        ("email", SanitizeToken::Email),
        ("url", SanitizeToken::Url),
        ("key", SanitizeToken::Key),
        ("title", SanitizeToken::Title),
        ("file-name", SanitizeToken::FileName),
        ("mime-type", SanitizeToken::MimeType),
        ("int", SanitizeToken::Int),
        ("float", SanitizeToken::Float),
        ("bool", SanitizeToken::Bool),
        ("money", SanitizeToken::Money),
        ("array", SanitizeToken::Array),
    ];

    /// The written form of the token.
    pub fn name(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(_, token)| *token == self)
            .map_or("unknown", |(name, _)| name)
    }

    fn apply(self, value: &Value, record: &Value, config: &EngineConfig) -> Value {
        match (self, value) {
            (SanitizeToken::Array, _) => to_list(value),
            (_, Value::Array(items)) => Value::Array(
                items
                    .iter()
                    .map(|item| self.apply(item, record, config))
                    .collect(),
            ),
            (SanitizeToken::Int, v) => coerce_int(v),
            (SanitizeToken::Float, v) => to_number(v).map_or_else(|| v.clone(), Value::from),
            (SanitizeToken::Bool, v) => to_bool(v).map_or_else(|| v.clone(), Value::Bool),
            (SanitizeToken::Money, v) => round_money(v, record, config),
            (token, Value::String(s)) => Value::String(token.clean(s)),
            (_, other) => other.clone(),
        }
    }

    fn clean(self, raw: &str) -> String {
        match self {
            SanitizeToken::Trim => raw.trim().to_string(),
            SanitizeToken::Text => text(raw),
            SanitizeToken::Textarea => strip_tags(raw)
                .replace("\r\n", "\n")
                .replace('\r', "\n")
                .trim()
                .to_string(),
            SanitizeToken::Email => email(raw),
            SanitizeToken::Url => url(raw),
            SanitizeToken::Key => raw
                .to_lowercase()
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
                .collect(),
            SanitizeToken::Title => slug(raw),
            SanitizeToken::FileName => file_name(raw),
            SanitizeToken::MimeType => raw
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '*' | '.' | '/'))
                .collect(),
            SanitizeToken::Int
            | SanitizeToken::Float
            | SanitizeToken::Bool
            | SanitizeToken::Money
            | SanitizeToken::Array => raw.to_string(),
        }
    }
}

impl FromStr for SanitizeToken {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        Self::ALL
            .iter()
            .find(|(name, _)| *name == raw)
            .map(|(_, token)| *token)
            .ok_or_else(|| {
                tracing::warn!(token = raw, "unknown sanitization token");
                ConfigError::UnknownSanitizer(raw.to_string())
            })
    }
}

impl fmt::Display for SanitizeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn strip_tags(raw: &str) -> String {
    let without_blocks = SCRIPT_BLOCKS.replace_all(raw, "");
    TAGS.replace_all(&without_blocks, "").into_owned()
}

fn text(raw: &str) -> String {
    let stripped: String = strip_tags(raw)
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

fn email(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || ".!#$%&'*+/=?^_`{|}~@-".contains(*c))
        .collect();
    match kept.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_ascii_lowercase()),
        None => kept,
    }
}

fn url(raw: &str) -> String {
    let kept: String = strip_tags(raw)
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control() && !matches!(c, '<' | '>' | '"'))
        .collect();
    let has_scheme = kept.contains("://")
        || kept.starts_with("mailto:")
        || kept.starts_with("tel:")
        || kept.starts_with(['/', '#', '?']);
    if kept.is_empty() || has_scheme {
        kept
    } else {
        format!("http://{kept}")
    }
}

fn slug(raw: &str) -> String {
    let lowered = strip_tags(raw).to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

fn file_name(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| !c.is_control() && !FILE_NAME_SPECIALS.contains(c))
        .collect();
    let mut out = String::with_capacity(kept.len());
    for c in kept.chars() {
        let c = if c.is_whitespace() { '-' } else { c };
        if !(c == '-' && out.ends_with('-')) {
            out.push(c);
        }
    }
    out.trim_matches(['.', '-', '_']).to_string()
}

fn coerce_int(value: &Value) -> Value {
    if let Some(n) = to_integer(value) {
        return Value::from(n);
    }
    match to_number(value) {
        Some(n) if n.abs() < i64::MAX as f64 => Value::from(n.trunc() as i64),
        _ => value.clone(),
    }
}

fn round_money(value: &Value, record: &Value, config: &EngineConfig) -> Value {
    let Some(amount) = to_amount(value) else {
        return value.clone();
    };
    let currency = record.get(&config.currency_field).and_then(Value::as_str);
    let scale = 10f64.powi(config.decimals_for(currency) as i32);
    // Past 2^53 minor units there is nothing left to round.
    if (amount * scale).abs() >= 9_007_199_254_740_992.0 {
        return Value::from(amount);
    }
    Value::from((amount * scale).round() / scale)
}

fn to_list(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Null => value.clone(),
        Value::String(s) => Value::Array(
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| Value::String(part.to_string()))
                .collect(),
        ),
        other => Value::Array(vec![other.clone()]),
    }
}

type TransformFn = dyn Fn(&Value, &Value) -> Value + Send + Sync;

/// One step of a field's sanitization.
#[derive(Clone)]
pub enum Transform {
    /// A builtin token.
    Token(SanitizeToken),
    /// A custom function called with `(raw, record)`, where `record` is the
    /// node holding the field. Under a wildcard that is the repeated
    /// element, so a money field can read its sibling currency.
    Custom(Arc<TransformFn>),
}

impl Transform {
    /// Wraps a closure.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Value + Send + Sync + 'static,
    {
        Transform::Custom(Arc::new(f))
    }

    fn run(&self, value: &Value, record: &Value, config: &EngineConfig) -> Value {
        match self {
            Transform::Token(token) => token.apply(value, record, config),
            Transform::Custom(f) => f(value, record),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Transform::Token(token) => token.name(),
            Transform::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Token(token) => write!(f, "Token({token})"),
            Transform::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<SanitizeToken> for Transform {
    fn from(token: SanitizeToken) -> Self {
        Transform::Token(token)
    }
}

/// Field path patterns and the transforms applied to them, in order.
///
/// # Examples
///
/// ```
/// use payload_policy::{SanitizationSpec, Transform};
/// use serde_json::json;
///
/// let spec = SanitizationSpec::new()
///     .field("title", "text")?
///     .field("items.*.amount", "money")?
///     .transform("slug", Transform::custom(|raw, record| {
///         if raw.as_str().is_some_and(str::is_empty) { record["title"].clone() } else { raw.clone() }
///     }));
///
/// let mut payload = json!({
///     "title": "  <b>Clean</b>   water ",
///     "slug": "",
///     "items": [{"amount": "1,000.456", "currency": "USD"}, {"amount": "500.4", "currency": "JPY"}],
/// });
/// spec.apply(&mut payload);
///
/// assert_eq!(payload["title"], "Clean water");
/// assert_eq!(payload["slug"], "Clean water");
/// assert_eq!(payload["items"][0]["amount"], 1000.46);
/// assert_eq!(payload["items"][1]["amount"], 500.0);
/// # Ok::<(), payload_policy::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SanitizationSpec {
    fields: Vec<(String, Vec<Transform>)>,
    config: Arc<EngineConfig>,
}

impl SanitizationSpec {
    /// An empty spec using the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `config` for currency-aware tokens.
    pub fn with_config(mut self, config: Arc<EngineConfig>) -> Self {
        self.config = config;
        self
    }

    /// Adds pipe-separated tokens (`"trim|email"`) for `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownSanitizer`] for an unknown token.
    pub fn field(mut self, pattern: impl Into<String>, tokens: &str) -> Result<Self, ConfigError> {
        let parsed = tokens
            .split('|')
            .filter(|t| !t.trim().is_empty())
            .map(|t| t.parse::<SanitizeToken>().map(Transform::Token))
            .collect::<Result<Vec<_>, _>>()?;
        self.entry(pattern.into()).extend(parsed);
        Ok(self)
    }

    /// Adds one transform for `pattern`.
    pub fn transform(mut self, pattern: impl Into<String>, transform: impl Into<Transform>) -> Self {
        self.entry(pattern.into()).push(transform.into());
        self
    }

    /// Builds a spec from a JSON object of `pattern: "token|token"`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a value is not a string or names an
    /// unknown token.
    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        let Value::Object(map) = value else {
            return Err(ConfigError::malformed(
                "sanitize",
                value.to_string(),
                "expected an object of field patterns",
            ));
        };
        map.iter().try_fold(Self::new(), |spec, (pattern, tokens)| {
            let tokens = tokens.as_str().ok_or_else(|| {
                ConfigError::malformed(pattern.as_str(), tokens.to_string(), "expected a token string")
            })?;
            spec.field(pattern.as_str(), tokens)
        })
    }

    fn entry(&mut self, pattern: String) -> &mut Vec<Transform> {
        let index = match self.fields.iter().position(|(p, _)| *p == pattern) {
            Some(index) => index,
            None => {
                self.fields.push((pattern, Vec::new()));
                self.fields.len() - 1
            }
        };
        &mut self.fields[index].1
    }

    /// Number of patterns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when no pattern is configured.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Rewrites `payload` in place.
    pub fn apply(&self, payload: &mut Value) {
        for (pattern, transforms) in &self.fields {
            for key in path::expand(pattern, payload) {
                for transform in transforms {
                    self.rewrite(payload, &key, transform);
                }
            }
        }
    }

    fn rewrite(&self, payload: &mut Value, key: &str, transform: &Transform) {
        let Some(current) = path::get(payload, key) else {
            return;
        };
        let record = match path::parent(key) {
            "" => &*payload,
            parent => path::get(payload, parent).unwrap_or(&Value::Null),
        };
        let next = transform.run(current, record, &self.config);
        if next != *current {
            trace!(field = key, transform = transform.name(), "rewrote value");
            path::set(payload, key, next);
        }
    }

    /// Sanitizes a tainted payload. The result is still tainted; only
    /// validation can verify it.
    pub fn sanitize(&self, input: Tainted<Value>) -> Tainted<Value> {
        let mut payload = input.into_inner();
        self.apply(&mut payload);
        Tainted::new(payload)
    }
}

/// Applies `spec` to an owned payload.
pub fn sanitize(mut payload: Value, spec: &SanitizationSpec) -> Value {
    spec.apply(&mut payload);
    payload
}
