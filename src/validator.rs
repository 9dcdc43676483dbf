use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::coerce::is_empty;
use crate::error::ConfigError;
use crate::path;
use crate::report::ValidationReport;
use crate::rules::{Rule, RuleContext, RuleRegistry};
use crate::schema::{Predicate, RuleEntry, Schema};
use crate::services::Services;

/// Rules evaluated even when the field is empty.
///
/// A value is empty when it is absent, `null`, a blank string, `[]` or `{}`
/// (see [`coerce::is_empty`](crate::coerce::is_empty)). Every other rule,
/// inline predicates included, is skipped on an empty value, so
/// `nullable|email` accepts a missing field while `required` still reports
/// it. For the same reason `array|min:1` accepts `[]`: only `required`
/// demands a non-empty collection. A custom rule joins this list only by
/// being named like one of these.
pub const ALWAYS_RUN_RULES: &[&str] = &[
    "required",
    "required_if",
    "required_if_exists",
    "prohibited",
    "prohibited_if",
    "same_as",
    "nullable",
];

/// Returns true when `rule` runs on empty values.
pub fn always_runs(rule: &str) -> bool {
    ALWAYS_RUN_RULES.contains(&rule)
}

enum Step {
    Rule(Arc<dyn Rule>),
    Predicate(Predicate),
}

struct CompiledField {
    pattern: String,
    steps: Vec<Step>,
    applied: Vec<&'static str>,
    /// The chain's `required` rule, kept to report empty collections under
    /// a wildcard pattern.
    required: Option<Arc<dyn Rule>>,
}

/// A schema whose every token has been resolved against a registry.
///
/// Produced by [`Validator::compile`]; reusable across requests and threads.
pub struct CompiledSchema {
    fields: Vec<CompiledField>,
}

impl CompiledSchema {
    /// Number of patterns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when there is nothing to validate.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Patterns in declaration order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.pattern.as_str())
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for field in &self.fields {
            map.entry(&field.pattern, &field.applied);
        }
        map.finish()
    }
}

/// Evaluates schemas against payloads.
///
/// Validation never fails on bad input: every failing rule adds a message to
/// the returned [`ValidationReport`] and evaluation carries on with the next
/// rule. Only wiring mistakes (unknown tokens, malformed parameters, missing
/// collaborators) are errors, and those surface from
/// [`compile`](Validator::compile) before any payload is seen.
///
/// # Examples
///
/// ```
/// use payload_policy::{Schema, Validator};
/// use serde_json::json;
///
/// let validator = Validator::default();
/// let schema = validator
///     .compile(&Schema::new()
///         .field("goal_type", "required_if:status,published")
///         .field("contact", "nullable|email"))
///     .unwrap();
///
/// let report = validator.validate(&json!({"status": "published"}), &schema);
/// assert_eq!(report.get("goal_type").unwrap().len(), 1);
/// assert!(report.get("contact").is_none());
///
/// assert!(validator.validate(&json!({"status": "draft"}), &schema).is_valid());
/// ```
#[derive(Clone)]
pub struct Validator {
    services: Services,
    registry: Arc<RuleRegistry>,
}

impl Validator {
    /// A validator using the builtin rule catalog.
    pub fn new(services: Services) -> Self {
        Self::with_registry(services, RuleRegistry::default())
    }

    /// A validator using a custom registry.
    pub fn with_registry(services: Services, registry: RuleRegistry) -> Self {
        Self {
            services,
            registry: Arc::new(registry),
        }
    }

    /// The injected collaborators.
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// The rule registry.
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Resolves every token in `schema`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an unknown rule, a missing or malformed
    /// parameter, or a rule whose collaborator was not injected.
    pub fn compile(&self, schema: &Schema) -> Result<CompiledSchema, ConfigError> {
        let mut fields = Vec::with_capacity(schema.len());
        for (pattern, chain) in schema.iter() {
            let mut steps = Vec::with_capacity(chain.entries().len());
            let mut applied = Vec::new();
            let mut required = None;
            for entry in chain.entries() {
                match entry {
                    RuleEntry::Token { name, param } => {
                        let rule = self.registry.build(name, param.as_deref())?;
                        self.check_collaborators(rule.as_ref())?;
                        applied.push(rule.name());
                        if rule.name() == "required" {
                            required = Some(Arc::clone(&rule));
                        }
                        steps.push(Step::Rule(rule));
                    }
                    RuleEntry::Predicate(predicate) => {
                        steps.push(Step::Predicate(predicate.clone()));
                    }
                }
            }
            fields.push(CompiledField {
                pattern: pattern.to_string(),
                steps,
                applied,
                required: required.filter(|_| path::is_pattern(pattern)),
            });
        }
        Ok(CompiledSchema { fields })
    }

    fn check_collaborators(&self, rule: &dyn Rule) -> Result<(), ConfigError> {
        match rule
            .collaborators()
            .iter()
            .find(|c| !self.services.provides(**c))
        {
            Some(missing) => {
                tracing::warn!(
                    rule = rule.name(),
                    collaborator = missing.name(),
                    "rule needs a collaborator that was not injected"
                );
                Err(ConfigError::MissingCollaborator {
                    rule: rule.name().to_string(),
                    collaborator: missing.name(),
                })
            }
            None => Ok(()),
        }
    }

    /// Validates `payload`, collecting every failure.
    pub fn validate(&self, payload: &Value, schema: &CompiledSchema) -> ValidationReport {
        let span = tracing::debug_span!("validate", fields = schema.len());
        let _guard = span.enter();

        let mut report = ValidationReport::new();
        for field in &schema.fields {
            let keys = path::expand(&field.pattern, payload);
            for key in &keys {
                self.check_field(field, key, payload, &mut report);
            }
            self.check_collections(field, &keys, payload, &mut report);
        }

        debug!(
            failed_fields = report.len(),
            messages = report.message_count(),
            "validation finished"
        );
        report
    }

    /// Compiles and validates in one call.
    ///
    /// # Errors
    ///
    /// Same as [`compile`](Validator::compile).
    pub fn validate_schema(
        &self,
        payload: &Value,
        schema: &Schema,
    ) -> Result<ValidationReport, ConfigError> {
        let compiled = self.compile(schema)?;
        Ok(self.validate(payload, &compiled))
    }

    // A required wildcard pattern reports every collection it iterates over
    // that holds no element, at the collection's own path.
    fn check_collections(
        &self,
        field: &CompiledField,
        keys: &[String],
        payload: &Value,
        report: &mut ValidationReport,
    ) {
        let Some(required) = &field.required else {
            return;
        };
        for parent in path::enclosing_collections(&field.pattern, payload) {
            if keys.iter().any(|key| path::is_below(key, &parent)) {
                continue;
            }
            let cx = RuleContext {
                key: &parent,
                value: path::get(payload, &parent),
                payload,
                applied: &field.applied,
                services: &self.services,
            };
            if !required.passes(&cx) {
                debug!(field = %parent, pattern = %field.pattern, "required collection is empty");
                report.add(parent.as_str(), required.message(&cx));
            }
        }
    }

    fn check_field(
        &self,
        field: &CompiledField,
        key: &str,
        payload: &Value,
        report: &mut ValidationReport,
    ) {
        let value = path::get(payload, key);
        let empty = is_empty(value);
        let cx = RuleContext {
            key,
            value,
            payload,
            applied: &field.applied,
            services: &self.services,
        };

        for step in &field.steps {
            match step {
                Step::Rule(rule) => {
                    if empty && !always_runs(rule.name()) {
                        continue;
                    }
                    if !rule.passes(&cx) {
                        debug!(field = key, rule = rule.name(), "rule failed");
                        report.add(key, rule.message(&cx));
                    }
                }
                Step::Predicate(predicate) => {
                    if empty {
                        continue;
                    }
                    if let Err(message) = predicate.check(value, key, payload) {
                        debug!(field = key, rule = "predicate", "rule failed");
                        report.add(key, message);
                    }
                }
            }
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(Services::default())
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("services", &self.services)
            .field("registry", &self.registry)
            .finish()
    }
}
