//! Declarative validation schemas.
//!
//! A schema maps field path patterns to rule chains. Chains come in two
//! grammars: the pipe string form (`"required|string|max:20"`) and the
//! array form, an ordered list of [`RuleEntry`] values that may mix tokens
//! with inline predicates.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ConfigError;

type PredicateFn = dyn Fn(Option<&Value>, &str, &Value) -> Result<(), String> + Send + Sync;

/// An inline check called with `(value, key, payload)`.
///
/// Returns `Err(message)` to fail the field. Predicates bypass the rule
/// registry and are skipped on empty values like any non-presence rule.
#[derive(Clone)]
pub struct Predicate(Arc<PredicateFn>);

impl Predicate {
    /// Wraps a closure.
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(Option<&Value>, &str, &Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self(Arc::new(check))
    }

    /// Runs the check.
    pub fn check(&self, value: Option<&Value>, key: &str, payload: &Value) -> Result<(), String> {
        (self.0)(value, key, payload)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

/// One element of a rule chain.
#[derive(Debug, Clone)]
pub enum RuleEntry {
    /// A registry rule, with the parameter after the first `:`.
    Token {
        /// Rule name.
        name: String,
        /// Raw parameter, not split further.
        param: Option<String>,
    },
    /// An inline predicate.
    Predicate(Predicate),
}

impl RuleEntry {
    /// Parses `name` or `name:param`.
    pub fn token(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.split_once(':') {
            Some((name, param)) => RuleEntry::Token {
                name: name.trim().to_string(),
                param: Some(param.to_string()),
            },
            None => RuleEntry::Token {
                name: raw.to_string(),
                param: None,
            },
        }
    }

    /// Wraps a closure as a predicate entry.
    pub fn predicate<F>(check: F) -> Self
    where
        F: Fn(Option<&Value>, &str, &Value) -> Result<(), String> + Send + Sync + 'static,
    {
        RuleEntry::Predicate(Predicate::new(check))
    }
}

impl From<&str> for RuleEntry {
    fn from(raw: &str) -> Self {
        RuleEntry::token(raw)
    }
}

impl From<Predicate> for RuleEntry {
    fn from(predicate: Predicate) -> Self {
        RuleEntry::Predicate(predicate)
    }
}

/// The ordered rules for one pattern. Order is evaluation order.
#[derive(Debug, Clone, Default)]
pub struct RuleChain {
    entries: Vec<RuleEntry>,
}

impl RuleChain {
    /// Parses the pipe grammar. Empty segments are ignored.
    pub fn parse(rules: &str) -> Self {
        let entries = rules
            .split('|')
            .filter(|segment| !segment.trim().is_empty())
            .map(RuleEntry::token)
            .collect();
        Self { entries }
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: impl Into<RuleEntry>) -> &mut Self {
        self.entries.push(entry.into());
        self
    }

    /// The entries in declaration order.
    pub fn entries(&self) -> &[RuleEntry] {
        &self.entries
    }

    /// Returns true when a token entry names `rule`.
    pub fn has_token(&self, rule: &str) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e, RuleEntry::Token { name, .. } if name == rule))
    }
}

impl From<&str> for RuleChain {
    fn from(rules: &str) -> Self {
        RuleChain::parse(rules)
    }
}

impl From<String> for RuleChain {
    fn from(rules: String) -> Self {
        RuleChain::parse(&rules)
    }
}

impl From<Vec<RuleEntry>> for RuleChain {
    fn from(entries: Vec<RuleEntry>) -> Self {
        Self { entries }
    }
}

impl From<Vec<&str>> for RuleChain {
    fn from(tokens: Vec<&str>) -> Self {
        tokens.into_iter().map(RuleEntry::token).collect::<Vec<_>>().into()
    }
}

/// Field path patterns and their rule chains, in declaration order.
///
/// # Examples
///
/// ```
/// use payload_policy::{RuleEntry, Schema};
///
/// let schema = Schema::new()
///     .field("title", "required|string|max:120")
///     .field("items.*.amount", vec![
///         RuleEntry::token("required"),
///         RuleEntry::predicate(|value, _key, _payload| match value {
///             Some(v) if v.as_f64().is_some_and(|n| n > 0.0) => Ok(()),
///             _ => Err("Amounts must be positive.".into()),
///         }),
///     ]);
///
/// assert_eq!(schema.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<(String, RuleChain)>,
}

impl Schema {
    /// An empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the chain for `pattern`. A repeated pattern extends its chain.
    pub fn field(mut self, pattern: impl Into<String>, chain: impl Into<RuleChain>) -> Self {
        let pattern = pattern.into();
        let chain = chain.into();
        match self.fields.iter_mut().find(|(p, _)| *p == pattern) {
            Some((_, existing)) => existing.entries.extend(chain.entries),
            None => self.fields.push((pattern, chain)),
        }
        self
    }

    /// Builds a schema from JSON: an object whose values are either a pipe
    /// string or an array of token strings.
    ///
    /// ```
    /// use payload_policy::Schema;
    /// use serde_json::json;
    ///
    /// let schema = Schema::from_json(&json!({
    ///     "status": "required|in:draft,publish",
    ///     "tags": ["nullable", "array"],
    /// })).unwrap();
    /// assert_eq!(schema.len(), 2);
    /// ```
    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        let Value::Object(map) = value else {
            return Err(ConfigError::malformed(
                "schema",
                value.to_string(),
                "expected an object of field patterns",
            ));
        };
        let mut schema = Schema::new();
        for (pattern, rules) in map {
            let chain = match rules {
                Value::String(s) => RuleChain::parse(s),
                Value::Array(items) => {
                    let mut chain = RuleChain::default();
                    for item in items {
                        let token = item.as_str().ok_or_else(|| {
                            ConfigError::malformed(
                                pattern.as_str(),
                                item.to_string(),
                                "rule entries must be strings",
                            )
                        })?;
                        chain.push(token);
                    }
                    chain
                }
                other => {
                    return Err(ConfigError::malformed(
                        pattern.as_str(),
                        other.to_string(),
                        "expected a rule string or list",
                    ))
                }
            };
            schema = schema.field(pattern.as_str(), chain);
        }
        Ok(schema)
    }

    /// Patterns and chains in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuleChain)> {
        self.fields.iter().map(|(p, c)| (p.as_str(), c))
    }

    /// Number of patterns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when the schema has no patterns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(chain: &RuleChain) -> Vec<String> {
        chain
            .entries()
            .iter()
            .map(|e| match e {
                RuleEntry::Token { name, .. } => name.clone(),
                RuleEntry::Predicate(_) => "<fn>".to_string(),
            })
            .collect()
    }

    #[test]
    fn pipe_grammar_keeps_params_whole() {
        let chain = RuleChain::parse("required|in:a,b,c|regex:/^\\d{2}:\\d{2}$/||");
        assert_eq!(names(&chain), ["required", "in", "regex"]);
        match &chain.entries()[2] {
            RuleEntry::Token { param, .. } => {
                assert_eq!(param.as_deref(), Some("/^\\d{2}:\\d{2}$/"))
            }
            RuleEntry::Predicate(_) => panic!("expected a token"),
        }
        assert!(chain.has_token("in"));
        assert!(!chain.has_token("a"));
    }

    #[test]
    fn array_grammar_mixes_tokens_and_predicates() {
        let chain: RuleChain = vec![
            RuleEntry::token("nullable"),
            RuleEntry::predicate(|_, _, _| Ok(())),
            RuleEntry::token("min:1"),
        ]
        .into();
        assert_eq!(names(&chain), ["nullable", "<fn>", "min"]);
    }

    #[test]
    fn repeated_patterns_extend_their_chain() {
        let schema = Schema::new()
            .field("title", "required")
            .field("title", "string")
            .field("goal", "integer");
        let (pattern, chain) = schema.iter().next().unwrap();
        assert_eq!(pattern, "title");
        assert_eq!(names(chain), ["required", "string"]);
        assert_eq!(schema.len(), 2);
    }

    #[test]
    fn from_json_rejects_non_string_entries() {
        assert!(Schema::from_json(&json!({"a": [1]})).is_err());
        assert!(Schema::from_json(&json!({"a": 1})).is_err());
        assert!(Schema::from_json(&json!(["a"])).is_err());
    }

    #[test]
    fn predicates_see_value_key_and_payload() {
        let p = Predicate::new(|value, key, payload| {
            if value == payload.get("expected") && key == "x" {
                Ok(())
            } else {
                Err("mismatch".into())
            }
        });
        let payload = json!({"expected": 1, "x": 1});
        assert!(p.check(payload.get("x"), "x", &payload).is_ok());
        assert_eq!(p.check(None, "x", &payload), Err("mismatch".into()));
    }
}
