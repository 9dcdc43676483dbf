use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{compare, exists, presence, types, Rule};
use crate::error::ConfigError;

/// Builds a rule from its optional parameter string.
pub type RuleFactory =
    Arc<dyn Fn(Option<&str>) -> Result<Arc<dyn Rule>, ConfigError> + Send + Sync>;

/// Maps rule names to factories.
///
/// [`RuleRegistry::default`] holds the builtin catalog; applications may
/// [`register`](RuleRegistry::register) more. Unknown names are rejected
/// with [`ConfigError::UnknownRule`].
///
/// # Examples
///
/// ```
/// use payload_policy::rules::RuleRegistry;
///
/// let registry = RuleRegistry::default();
/// assert_eq!(registry.resolve("min:3").unwrap().name(), "min");
/// assert!(registry.resolve("sometimes").is_err());
/// ```
#[derive(Clone)]
pub struct RuleRegistry {
    factories: HashMap<String, RuleFactory>,
}

impl RuleRegistry {
    /// A registry with no rules at all.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers a factory under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(Option<&str>) -> Result<Arc<dyn Rule>, ConfigError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Returns true when `name` resolves to a factory.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Resolves a full token such as `min:3`.
    pub fn resolve(&self, token: &str) -> Result<Arc<dyn Rule>, ConfigError> {
        let token = token.trim();
        match token.split_once(':') {
            Some((name, param)) => self.build(name, Some(param)),
            None => self.build(token, None),
        }
    }

    /// Builds rule `name` bound to `param`.
    pub fn build(&self, name: &str, param: Option<&str>) -> Result<Arc<dyn Rule>, ConfigError> {
        let name = name.trim();
        match self.factories.get(name) {
            Some(factory) => factory(param),
            None => {
                tracing::warn!(rule = name, "unknown rule token");
                Err(ConfigError::UnknownRule(name.to_string()))
            }
        }
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for name in BUILTIN_NAMES {
            if let Some(factory) = builtin(name) {
                registry.register(*name, factory);
            }
        }
        registry
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("RuleRegistry").field("rules", &names).finish()
    }
}

type BuiltinFactory = fn(Option<&str>) -> Result<Arc<dyn Rule>, ConfigError>;

/// Every builtin rule name.
pub(crate) const BUILTIN_NAMES: &[&str] = &[
    "required",
    "required_if",
    "required_if_exists",
    "nullable",
    "prohibited",
    "prohibited_if",
    "string",
    "number",
    "integer",
    "float",
    "boolean",
    "array",
    "object",
    "email",
    "email_unique",
    "url",
    "regex",
    "in",
    "not_in",
    "min",
    "max",
    "greater_than_equal",
    "gt",
    "after_date",
    "date",
    "date_format",
    "same_as",
    "exists",
    "post_exists",
    "user_exists",
];

fn builtin(name: &str) -> Option<BuiltinFactory> {
    let factory: BuiltinFactory = match name {
        "required" => presence::required,
        "required_if" => presence::required_if,
        "required_if_exists" => presence::required_if_exists,
        "nullable" => presence::nullable,
        "prohibited" => presence::prohibited,
        "prohibited_if" => presence::prohibited_if,
        "string" => types::string,
        "number" => types::number,
        "integer" => types::integer,
        "float" => types::float,
        "boolean" => types::boolean,
        "array" => types::array,
        "object" => types::object,
        "email" => types::email,
        "url" => types::url,
        "regex" => types::regex,
        "date" => types::date,
        "date_format" => types::date_format,
        "in" => compare::in_list,
        "not_in" => compare::not_in_list,
        "min" => compare::min,
        "max" => compare::max,
        "greater_than_equal" => compare::greater_than_equal,
        "gt" => compare::gt,
        "after_date" => compare::after_date,
        "same_as" => compare::same_as,
        "exists" => exists::exists,
        "post_exists" => exists::post_exists,
        "user_exists" => exists::user_exists,
        "email_unique" => exists::email_unique,
        _ => return None,
    };
    Some(factory)
}
