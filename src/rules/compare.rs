//! Membership, size and cross-field comparison rules.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use serde_json::Value;

use super::{require_param, Rule, RuleContext};
use crate::coerce::{to_datetime, to_number, to_plain_string};
use crate::error::ConfigError;
use crate::path;

type Built = Result<Arc<dyn Rule>, ConfigError>;

#[derive(Debug)]
struct Membership {
    allowed: Vec<String>,
    negated: bool,
}

impl Membership {
    fn contains(&self, value: &Value) -> bool {
        let rendered = to_plain_string(value);
        self.allowed.iter().any(|a| *a == rendered)
    }
}

impl Rule for Membership {
    fn name(&self) -> &'static str {
        if self.negated {
            "not_in"
        } else {
            "in"
        }
    }

    fn passes(&self, cx: &RuleContext<'_>) -> bool {
        let Some(value) = cx.value else {
            return self.negated;
        };
        match (value, self.negated) {
            (Value::Array(items), false) => items.iter().all(|v| self.contains(v)),
            (Value::Array(items), true) => !items.iter().any(|v| self.contains(v)),
            (Value::Object(_), _) => false,
            (scalar, negated) => self.contains(scalar) != negated,
        }
    }

    fn message(&self, cx: &RuleContext<'_>) -> String {
        cx.format("The selected {0} is invalid.", &[&cx.label()])
    }
}

fn membership(name: &str, param: Option<&str>, negated: bool) -> Built {
    let raw = require_param(name, param)?;
    let allowed = raw.split(',').map(|v| v.trim().to_string()).collect();
    Ok(Arc::new(Membership { allowed, negated }))
}

pub(super) fn in_list(param: Option<&str>) -> Built {
    membership("in", param, false)
}

pub(super) fn not_in_list(param: Option<&str>) -> Built {
    membership("not_in", param, true)
}

/// What `min` and `max` measure, inferred from the rest of the chain.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Measure {
    Characters,
    Numeric,
    Items,
}

impl Measure {
    fn infer(cx: &RuleContext<'_>) -> Self {
        if cx.has_rule("array") {
            Measure::Items
        } else if ["number", "integer", "float"].iter().any(|r| cx.has_rule(r)) {
            Measure::Numeric
        } else if cx.has_rule("string") {
            Measure::Characters
        } else {
            match cx.value {
                Some(Value::Array(_) | Value::Object(_)) => Measure::Items,
                Some(Value::Number(_)) => Measure::Numeric,
                _ => Measure::Characters,
            }
        }
    }

    fn of(self, value: &Value) -> Option<f64> {
        match (self, value) {
            (Measure::Items, Value::Array(items)) => Some(items.len() as f64),
            (Measure::Items, Value::Object(map)) => Some(map.len() as f64),
            (Measure::Numeric, v) => to_number(v),
            (Measure::Characters, Value::String(s)) => Some(s.chars().count() as f64),
            (Measure::Characters, v @ Value::Number(_)) => {
                Some(v.to_string().chars().count() as f64)
            }
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Bound {
    limit: f64,
    raw: String,
    upper: bool,
}

impl Rule for Bound {
    fn name(&self) -> &'static str {
        if self.upper {
            "max"
        } else {
            "min"
        }
    }

    fn passes(&self, cx: &RuleContext<'_>) -> bool {
        let measure = Measure::infer(cx);
        match cx.value.and_then(|v| measure.of(v)) {
            Some(size) if self.upper => size <= self.limit,
            Some(size) => size >= self.limit,
            None => false,
        }
    }

    fn message(&self, cx: &RuleContext<'_>) -> String {
        let template = match (Measure::infer(cx), self.upper) {
            (Measure::Characters, false) => "The {0} must be at least {1} characters.",
            (Measure::Numeric, false) => "The {0} must be at least {1}.",
            (Measure::Items, false) => "The {0} must have at least {1} items.",
            (Measure::Characters, true) => "The {0} may not be greater than {1} characters.",
            (Measure::Numeric, true) => "The {0} may not be greater than {1}.",
            (Measure::Items, true) => "The {0} may not have more than {1} items.",
        };
        cx.format(template, &[&cx.label(), &self.raw])
    }
}

fn bound(name: &str, param: Option<&str>, upper: bool) -> Built {
    let raw = require_param(name, param)?;
    let limit = raw
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ConfigError::malformed(name, raw, "expected a number"))?;
    Ok(Arc::new(Bound {
        limit,
        raw: raw.to_string(),
        upper,
    }))
}

pub(super) fn min(param: Option<&str>) -> Built {
    bound("min", param, false)
}

pub(super) fn max(param: Option<&str>) -> Built {
    bound("max", param, true)
}

/// Which comparison a [`Comparison`] enforces.
#[derive(Debug, Clone, Copy)]
enum Operator {
    Greater,
    GreaterOrEqual,
    After,
}

/// The right-hand side of a comparison, resolved for one field.
enum Operand {
    Number(f64),
    Date(NaiveDateTime),
    Unresolved,
}

#[derive(Debug)]
struct Comparison {
    operator: Operator,
    reference: String,
}

impl Comparison {
    fn dates_expected(&self, cx: &RuleContext<'_>) -> bool {
        matches!(self.operator, Operator::After)
            || cx.has_rule("date")
            || cx.has_rule("date_format")
    }

    /// A field reference wins over a literal; `today` and `now` are only
    /// meaningful for date comparisons.
    fn operand(&self, cx: &RuleContext<'_>, dates: bool) -> Operand {
        let literal = Value::String(self.reference.clone());
        let other = match cx.lookup(&self.reference) {
            Some(v) if !v.is_null() => v,
            _ => &literal,
        };
        if dates {
            match self.reference.as_str() {
                "now" => return Operand::Date(Local::now().naive_local()),
                "today" => {
                    let midnight = Local::now().date_naive().and_hms_opt(0, 0, 0);
                    return midnight.map_or(Operand::Unresolved, Operand::Date);
                }
                _ => {}
            }
        }
        if let Some(date) = to_datetime(other).filter(|_| dates || to_number(other).is_none()) {
            return Operand::Date(date);
        }
        to_number(other).map_or(Operand::Unresolved, Operand::Number)
    }

    fn operand_label(&self, cx: &RuleContext<'_>) -> String {
        if cx.lookup(&self.reference).is_some() {
            path::label(&self.reference)
        } else {
            self.reference.clone()
        }
    }
}

impl Rule for Comparison {
    fn name(&self) -> &'static str {
        match self.operator {
            Operator::Greater => "gt",
            Operator::GreaterOrEqual => "greater_than_equal",
            Operator::After => "after_date",
        }
    }

    fn passes(&self, cx: &RuleContext<'_>) -> bool {
        let Some(value) = cx.value else {
            return false;
        };
        let ordering = match self.operand(cx, self.dates_expected(cx)) {
            Operand::Unresolved => return true,
            Operand::Date(right) => to_datetime(value).map(|left| left.cmp(&right)),
            Operand::Number(right) => to_number(value).and_then(|left| left.partial_cmp(&right)),
        };
        match (ordering, self.operator) {
            (Some(Ordering::Greater), _) => true,
            (Some(Ordering::Equal), Operator::GreaterOrEqual) => true,
            _ => false,
        }
    }

    fn message(&self, cx: &RuleContext<'_>) -> String {
        let template = match self.operator {
            Operator::Greater => "The {0} must be greater than {1}.",
            Operator::GreaterOrEqual => "The {0} must be greater than or equal to {1}.",
            Operator::After => "The {0} must be a date after {1}.",
        };
        cx.format(template, &[&cx.label(), &self.operand_label(cx)])
    }
}

fn comparison(name: &str, param: Option<&str>, operator: Operator) -> Built {
    let reference = require_param(name, param)?;
    Ok(Arc::new(Comparison {
        operator,
        reference: reference.to_string(),
    }))
}

pub(super) fn gt(param: Option<&str>) -> Built {
    comparison("gt", param, Operator::Greater)
}

pub(super) fn greater_than_equal(param: Option<&str>) -> Built {
    comparison("greater_than_equal", param, Operator::GreaterOrEqual)
}

pub(super) fn after_date(param: Option<&str>) -> Built {
    comparison("after_date", param, Operator::After)
}

/// Strict equality with another field. `null` counts as absent, so two
/// absent fields match.
#[derive(Debug)]
struct SameAs {
    field: String,
}

impl Rule for SameAs {
    fn name(&self) -> &'static str {
        "same_as"
    }

    fn passes(&self, cx: &RuleContext<'_>) -> bool {
        let present = |v: Option<&Value>| v.filter(|v| !v.is_null()).cloned();
        present(cx.value) == present(cx.lookup(&self.field))
    }

    fn message(&self, cx: &RuleContext<'_>) -> String {
        cx.format(
            "The {0} and {1} must match.",
            &[&cx.label(), &path::label(&self.field)],
        )
    }
}

pub(super) fn same_as(param: Option<&str>) -> Built {
    let field = require_param("same_as", param)?;
    Ok(Arc::new(SameAs {
        field: field.to_string(),
    }))
}
