//! Validation rules and the registry that resolves rule tokens.
//!
//! A rule token is a name with an optional parameter after the first colon
//! (`min:3`, `in:draft,publish`, `regex:/^a:b$/`). The registry only splits
//! off the name; each rule parses its own parameter grammar when it is
//! built, so malformed parameters surface as [`ConfigError`]s at schema
//! compile time.

use std::fmt;

use serde_json::Value;

use crate::error::ConfigError;
use crate::path;
use crate::services::{Collaborator, Services};

mod compare;
mod exists;
mod presence;
mod registry;
mod types;

pub use registry::{RuleFactory, RuleRegistry};

/// Everything a rule sees while evaluating one concrete field.
#[derive(Clone, Copy)]
pub struct RuleContext<'a> {
    /// Concrete path of the field, such as `items.2.amount`.
    pub key: &'a str,
    /// The field's value, `None` when absent.
    pub value: Option<&'a Value>,
    /// The whole payload, for cross-field rules.
    pub payload: &'a Value,
    /// Names of every rule in this field's chain, in declaration order.
    pub applied: &'a [&'a str],
    /// Injected collaborators and configuration.
    pub services: &'a Services,
}

impl<'a> RuleContext<'a> {
    /// Returns true when the field's chain declares `rule`.
    pub fn has_rule(&self, rule: &str) -> bool {
        self.applied.contains(&rule)
    }

    /// Human label of the field, for messages.
    pub fn label(&self) -> String {
        path::label(self.key)
    }

    /// Renders a message template through the injected formatter.
    pub fn format(&self, template: &str, args: &[&str]) -> String {
        self.services.formatter().format(template, args)
    }

    /// Resolves a field reference from a rule parameter.
    ///
    /// Wildcards in the reference are bound to the indices of the current
    /// key. A bare name on a nested field is looked up as a sibling first,
    /// then from the payload root.
    pub fn lookup(&self, reference: &str) -> Option<&'a Value> {
        let parent = path::parent(self.key);
        if !parent.is_empty() && !reference.contains('.') {
            if let Some(found) = path::get(self.payload, &format!("{parent}.{reference}")) {
                return Some(found);
            }
        }
        path::get(self.payload, &path::bind_wildcards(reference, self.key))
    }
}

impl fmt::Debug for RuleContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleContext")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("applied", &self.applied)
            .finish()
    }
}

/// A named validation rule, already bound to its parameter.
pub trait Rule: Send + Sync + fmt::Debug {
    /// The registry name, such as `required` or `min`.
    fn name(&self) -> &'static str;

    /// Returns true when the field satisfies the rule.
    fn passes(&self, cx: &RuleContext<'_>) -> bool;

    /// The failure message for this field.
    fn message(&self, cx: &RuleContext<'_>) -> String;

    /// Collaborators the rule needs at evaluation time.
    fn collaborators(&self) -> &'static [Collaborator] {
        &[]
    }
}

pub(crate) fn require_param<'p>(rule: &str, param: Option<&'p str>) -> Result<&'p str, ConfigError> {
    match param.map(str::trim) {
        Some(p) if !p.is_empty() => Ok(p),
        _ => Err(ConfigError::missing_param(rule)),
    }
}

/// Splits `field,v1;v2` into the field and its typed literal values.
pub(crate) fn field_and_values(
    rule: &str,
    param: Option<&str>,
) -> Result<(String, Vec<Value>), ConfigError> {
    let raw = require_param(rule, param)?;
    let Some((field, values)) = raw.split_once(',') else {
        return Err(ConfigError::malformed(rule, raw, "expected `field,value1;value2`"));
    };
    let field = field.trim();
    if field.is_empty() {
        return Err(ConfigError::malformed(rule, raw, "missing field name"));
    }
    let values = values.split(';').map(crate::coerce::parse_literal).collect();
    Ok((field.to_string(), values))
}

pub(crate) fn describe_values(values: &[Value]) -> String {
    values
        .iter()
        .map(crate::coerce::to_plain_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Resolves `token` with the builtin registry and evaluates it on `key`.
    pub(crate) fn check(token: &str, payload: &Value, key: &str, applied: &[&str]) -> bool {
        check_with(&Services::default(), token, payload, key, applied)
    }

    pub(crate) fn check_with(
        services: &Services,
        token: &str,
        payload: &Value,
        key: &str,
        applied: &[&str],
    ) -> bool {
        let rule = RuleRegistry::default()
            .resolve(token)
            .unwrap_or_else(|e| panic!("{token}: {e}"));
        let cx = RuleContext {
            key,
            value: path::get(payload, key),
            payload,
            applied,
            services,
        };
        rule.passes(&cx)
    }

    pub(crate) fn message(token: &str, payload: &Value, key: &str) -> String {
        let services = Services::default();
        let rule = RuleRegistry::default().resolve(token).unwrap();
        let cx = RuleContext {
            key,
            value: path::get(payload, key),
            payload,
            applied: &[],
            services: &services,
        };
        rule.message(&cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_prefers_sibling_then_root() {
        let payload = json!({
            "min": 1,
            "tiers": [{"min": 10, "max": 5}]
        });
        let services = Services::default();
        let cx = RuleContext {
            key: "tiers.0.max",
            value: path::get(&payload, "tiers.0.max"),
            payload: &payload,
            applied: &[],
            services: &services,
        };

        assert_eq!(cx.lookup("min"), Some(&json!(10)));
        assert_eq!(cx.lookup("tiers.*.min"), Some(&json!(10)));
        assert_eq!(cx.lookup("tiers.0.min"), Some(&json!(10)));
        assert_eq!(cx.lookup("missing"), None);
    }

    #[test]
    fn field_and_values_coerces_literals() {
        let (field, values) = field_and_values("required_if", Some("has_goal,true;null")).unwrap();
        assert_eq!(field, "has_goal");
        assert_eq!(values, vec![json!(true), json!(null)]);

        assert!(matches!(
            field_and_values("required_if", Some("has_goal")),
            Err(ConfigError::MalformedParameter { .. })
        ));
        assert!(matches!(
            field_and_values("required_if", None),
            Err(ConfigError::MissingParameter { .. })
        ));
    }
}
