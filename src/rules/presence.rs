//! Presence rules: `required*`, `prohibited*` and `nullable`.
//!
//! These always run, even on empty values; see
//! [`ALWAYS_RUN_RULES`](crate::ALWAYS_RUN_RULES).

use std::sync::Arc;

use serde_json::Value;

use super::{describe_values, field_and_values, require_param, Rule, RuleContext};
use crate::coerce::is_empty;
use crate::error::ConfigError;
use crate::path;

type Built = Result<Arc<dyn Rule>, ConfigError>;

#[derive(Debug)]
struct Required;

impl Rule for Required {
    fn name(&self) -> &'static str {
        "required"
    }

    fn passes(&self, cx: &RuleContext<'_>) -> bool {
        !is_empty(cx.value)
    }

    fn message(&self, cx: &RuleContext<'_>) -> String {
        cx.format("The {0} field is required.", &[&cx.label()])
    }
}

pub(super) fn required(_: Option<&str>) -> Built {
    Ok(Arc::new(Required))
}

/// A sibling condition: `field` currently strict-equals one of `values`.
#[derive(Debug)]
struct Condition {
    field: String,
    values: Vec<Value>,
}

impl Condition {
    fn holds(&self, cx: &RuleContext<'_>) -> bool {
        let current = cx.lookup(&self.field).unwrap_or(&Value::Null);
        self.values.iter().any(|expected| expected == current)
    }

    fn label(&self) -> String {
        path::label(&self.field)
    }
}

#[derive(Debug)]
struct RequiredIf(Condition);

impl Rule for RequiredIf {
    fn name(&self) -> &'static str {
        "required_if"
    }

    fn passes(&self, cx: &RuleContext<'_>) -> bool {
        !self.0.holds(cx) || !is_empty(cx.value)
    }

    fn message(&self, cx: &RuleContext<'_>) -> String {
        cx.format(
            "The {0} field is required when {1} is {2}.",
            &[&cx.label(), &self.0.label(), &describe_values(&self.0.values)],
        )
    }
}

pub(super) fn required_if(param: Option<&str>) -> Built {
    let (field, values) = field_and_values("required_if", param)?;
    Ok(Arc::new(RequiredIf(Condition { field, values })))
}

#[derive(Debug)]
struct RequiredIfExists {
    field: String,
}

impl Rule for RequiredIfExists {
    fn name(&self) -> &'static str {
        "required_if_exists"
    }

    fn passes(&self, cx: &RuleContext<'_>) -> bool {
        let other_present = cx.lookup(&self.field).is_some_and(|v| !v.is_null());
        !other_present || !is_empty(cx.value)
    }

    fn message(&self, cx: &RuleContext<'_>) -> String {
        cx.format(
            "The {0} field is required when {1} is present.",
            &[&cx.label(), &path::label(&self.field)],
        )
    }
}

pub(super) fn required_if_exists(param: Option<&str>) -> Built {
    let field = require_param("required_if_exists", param)?;
    Ok(Arc::new(RequiredIfExists {
        field: field.to_string(),
    }))
}

/// Marks a field as optional. Never fails; its presence in a chain is what
/// matters to the null-skip policy.
#[derive(Debug)]
struct Nullable;

impl Rule for Nullable {
    fn name(&self) -> &'static str {
        "nullable"
    }

    fn passes(&self, _: &RuleContext<'_>) -> bool {
        true
    }

    fn message(&self, _: &RuleContext<'_>) -> String {
        String::new()
    }
}

pub(super) fn nullable(_: Option<&str>) -> Built {
    Ok(Arc::new(Nullable))
}

#[derive(Debug)]
struct Prohibited;

impl Rule for Prohibited {
    fn name(&self) -> &'static str {
        "prohibited"
    }

    fn passes(&self, cx: &RuleContext<'_>) -> bool {
        is_empty(cx.value)
    }

    fn message(&self, cx: &RuleContext<'_>) -> String {
        cx.format("The {0} field is prohibited.", &[&cx.label()])
    }
}

pub(super) fn prohibited(_: Option<&str>) -> Built {
    Ok(Arc::new(Prohibited))
}

#[derive(Debug)]
struct ProhibitedIf(Condition);

impl Rule for ProhibitedIf {
    fn name(&self) -> &'static str {
        "prohibited_if"
    }

    fn passes(&self, cx: &RuleContext<'_>) -> bool {
        !self.0.holds(cx) || is_empty(cx.value)
    }

    fn message(&self, cx: &RuleContext<'_>) -> String {
        cx.format(
            "The {0} field is prohibited when {1} is {2}.",
            &[&cx.label(), &self.0.label(), &describe_values(&self.0.values)],
        )
    }
}

pub(super) fn prohibited_if(param: Option<&str>) -> Built {
    let (field, values) = field_and_values("prohibited_if", param)?;
    Ok(Arc::new(ProhibitedIf(Condition { field, values })))
}
