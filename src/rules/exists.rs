//! Existence rules backed by the injected [`RecordStore`] and
//! [`UserDirectory`].
//!
//! A missing record is a validation failure. A missing collaborator is a
//! wiring bug, caught when the schema is compiled.
//!
//! [`RecordStore`]: crate::RecordStore
//! [`UserDirectory`]: crate::UserDirectory

use std::sync::Arc;

use serde_json::Value;

use super::{require_param, Rule, RuleContext};
use crate::coerce::to_integer;
use crate::error::ConfigError;
use crate::services::Collaborator;
use crate::store::{PostRecord, UserRecord};

type Built = Result<Arc<dyn Rule>, ConfigError>;

/// Reads a non-negative record id from a number or numeric string.
fn record_id(value: &Value) -> Option<u64> {
    to_integer(value).and_then(|n| u64::try_from(n).ok())
}

/// The last non-index segment of a path, used as the default column.
fn column_for(key: &str) -> &str {
    key.rsplit('.')
        .find(|s| s.parse::<usize>().is_err())
        .unwrap_or(key)
}

/// `exists:table[,column]`. Arrays pass when every element exists.
#[derive(Debug)]
struct Exists {
    table: String,
    column: Option<String>,
}

impl Rule for Exists {
    fn name(&self) -> &'static str {
        "exists"
    }

    fn passes(&self, cx: &RuleContext<'_>) -> bool {
        let (Some(records), Some(value)) = (cx.services.records(), cx.value) else {
            return false;
        };
        let column = self.column.as_deref().unwrap_or_else(|| column_for(cx.key));
        match value {
            Value::Array(items) => {
                !items.is_empty() && items.iter().all(|v| records.exists(&self.table, column, v))
            }
            scalar => records.exists(&self.table, column, scalar),
        }
    }

    fn message(&self, cx: &RuleContext<'_>) -> String {
        cx.format("The selected {0} is invalid.", &[&cx.label()])
    }

    fn collaborators(&self) -> &'static [Collaborator] {
        &[Collaborator::Records]
    }
}

pub(super) fn exists(param: Option<&str>) -> Built {
    let raw = require_param("exists", param)?;
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let (table, column) = match parts.as_slice() {
        [table] => (*table, None),
        [table, column] if !column.is_empty() => (*table, Some(column.to_string())),
        _ => return Err(ConfigError::malformed("exists", raw, "expected `table[,column]`")),
    };
    if table.is_empty() {
        return Err(ConfigError::malformed("exists", raw, "missing table name"));
    }
    Ok(Arc::new(Exists {
        table: table.to_string(),
        column,
    }))
}

/// An attribute `post_exists` can constrain.
#[derive(Debug, Clone, Copy)]
enum PostAttribute {
    PostType,
    Status,
    Parent,
    Author,
}

impl PostAttribute {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "post_type" => Some(Self::PostType),
            "status" => Some(Self::Status),
            "parent" => Some(Self::Parent),
            "author" => Some(Self::Author),
            _ => None,
        }
    }
}

/// One `key=alt1;alt2` clause.
#[derive(Debug)]
struct PostClause {
    attribute: PostAttribute,
    alternatives: Vec<String>,
}

impl PostClause {
    fn holds(&self, post: &PostRecord, cx: &RuleContext<'_>) -> bool {
        self.alternatives.iter().any(|expected| match self.attribute {
            PostAttribute::PostType => post.post_type == *expected,
            PostAttribute::Status => post.status == *expected,
            PostAttribute::Parent => resolve_id(expected, cx) == Some(post.parent),
            PostAttribute::Author => resolve_id(expected, cx) == Some(post.author),
        })
    }
}

/// An id literal, or the id held by the named field.
fn resolve_id(raw: &str, cx: &RuleContext<'_>) -> Option<u64> {
    raw.parse::<u64>()
        .ok()
        .or_else(|| cx.lookup(raw).and_then(record_id))
}

#[derive(Debug)]
struct PostExists {
    clauses: Vec<PostClause>,
}

impl Rule for PostExists {
    fn name(&self) -> &'static str {
        "post_exists"
    }

    fn passes(&self, cx: &RuleContext<'_>) -> bool {
        let Some(records) = cx.services.records() else {
            return false;
        };
        cx.value
            .and_then(record_id)
            .and_then(|id| records.find_post(id))
            .is_some_and(|post| self.clauses.iter().all(|c| c.holds(&post, cx)))
    }

    fn message(&self, cx: &RuleContext<'_>) -> String {
        cx.format("The selected {0} is invalid.", &[&cx.label()])
    }

    fn collaborators(&self) -> &'static [Collaborator] {
        &[Collaborator::Records]
    }
}

pub(super) fn post_exists(param: Option<&str>) -> Built {
    let Some(raw) = param.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(Arc::new(PostExists { clauses: Vec::new() }));
    };
    let mut clauses = Vec::new();
    for clause in raw.split(',') {
        let Some((key, values)) = clause.split_once('=') else {
            return Err(ConfigError::malformed(
                "post_exists",
                raw,
                format!("clause `{}` is not `key=value`", clause.trim()),
            ));
        };
        let attribute = PostAttribute::parse(key.trim()).ok_or_else(|| {
            ConfigError::malformed(
                "post_exists",
                raw,
                format!("unknown attribute `{}`", key.trim()),
            )
        })?;
        let alternatives: Vec<String> = values
            .split(';')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
            .collect();
        if alternatives.is_empty() {
            return Err(ConfigError::malformed(
                "post_exists",
                raw,
                format!("attribute `{}` has no value", key.trim()),
            ));
        }
        clauses.push(PostClause {
            attribute,
            alternatives,
        });
    }
    Ok(Arc::new(PostExists { clauses }))
}

#[derive(Debug)]
enum UserConstraint {
    Role(String),
    Capability(String),
}

impl UserConstraint {
    fn holds(&self, user: &UserRecord) -> bool {
        match self {
            UserConstraint::Role(role) => user.has_role(role),
            UserConstraint::Capability(cap) => user.can(cap),
        }
    }
}

/// `user_exists[:role=x|capability=y]`. The value is a user id, or an email
/// when it is not numeric.
#[derive(Debug)]
struct UserExists {
    constraint: Option<UserConstraint>,
}

impl Rule for UserExists {
    fn name(&self) -> &'static str {
        "user_exists"
    }

    fn passes(&self, cx: &RuleContext<'_>) -> bool {
        let (Some(users), Some(value)) = (cx.services.users(), cx.value) else {
            return false;
        };
        let user = match record_id(value) {
            Some(id) => users.find(id),
            None => value.as_str().and_then(|email| users.find_by_email(email)),
        };
        user.is_some_and(|u| self.constraint.as_ref().map_or(true, |c| c.holds(&u)))
    }

    fn message(&self, cx: &RuleContext<'_>) -> String {
        cx.format("The selected {0} is invalid.", &[&cx.label()])
    }

    fn collaborators(&self) -> &'static [Collaborator] {
        &[Collaborator::Users]
    }
}

pub(super) fn user_exists(param: Option<&str>) -> Built {
    let constraint = match param.map(str::trim).filter(|p| !p.is_empty()) {
        None => None,
        Some(raw) => match raw.split_once('=') {
            Some(("role", role)) if !role.trim().is_empty() => {
                Some(UserConstraint::Role(role.trim().to_string()))
            }
            Some(("capability", cap)) if !cap.trim().is_empty() => {
                Some(UserConstraint::Capability(cap.trim().to_string()))
            }
            _ => {
                return Err(ConfigError::malformed(
                    "user_exists",
                    raw,
                    "expected `role=name` or `capability=name`",
                ))
            }
        },
    };
    Ok(Arc::new(UserExists { constraint }))
}

/// `email_unique[:id_field]`. The email must not belong to any user other
/// than the one whose id is held by `id_field`.
#[derive(Debug)]
struct EmailUnique {
    ignore_id_field: Option<String>,
}

impl Rule for EmailUnique {
    fn name(&self) -> &'static str {
        "email_unique"
    }

    fn passes(&self, cx: &RuleContext<'_>) -> bool {
        let Some(users) = cx.services.users() else {
            return false;
        };
        let Some(email) = cx.value.and_then(Value::as_str) else {
            return false;
        };
        match users.find_by_email(email) {
            None => true,
            Some(owner) => self
                .ignore_id_field
                .as_deref()
                .and_then(|field| cx.lookup(field))
                .and_then(record_id)
                .is_some_and(|id| id == owner.id),
        }
    }

    fn message(&self, cx: &RuleContext<'_>) -> String {
        cx.format("The {0} has already been taken.", &[&cx.label()])
    }

    fn collaborators(&self) -> &'static [Collaborator] {
        &[Collaborator::Users]
    }
}

pub(super) fn email_unique(param: Option<&str>) -> Built {
    let ignore_id_field = param
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from);
    Ok(Arc::new(EmailUnique { ignore_id_field }))
}
