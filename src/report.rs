use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field-keyed validation failures.
///
/// Keys are concrete field paths (`items.2.amount`, never a pattern); each
/// holds the failed rules' messages in declaration order. A field appears
/// only if at least one of its rules failed, so an empty report means the
/// payload is valid.
///
/// Serializes to the `{ "field": ["message", ...] }` shape.
///
/// # Examples
///
/// ```
/// use payload_policy::ValidationReport;
///
/// let mut report = ValidationReport::new();
/// assert!(report.is_valid());
///
/// report.add("title", "The title field is required.");
/// assert_eq!(report.get("title"), Some(&["The title field is required.".to_string()][..]));
/// assert_eq!(
///     serde_json::to_string(&report).unwrap(),
///     r#"{"title":["The title field is required."]}"#
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationReport {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationReport {
    /// An empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message under `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(field.into()).or_default().push(message.into());
    }

    /// Returns true when no field failed.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Alias of [`is_empty`](Self::is_empty) that reads better at call sites.
    pub fn is_valid(&self) -> bool {
        self.is_empty()
    }

    /// Messages recorded for `field`.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    /// Returns true when `field` has at least one message.
    pub fn has(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    /// Number of failed fields.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Failed field paths in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// Total number of messages across all fields.
    pub fn message_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    /// Moves every message of `other` into this report.
    pub fn merge(&mut self, other: ValidationReport) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
    }

    /// The underlying map.
    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.errors
    }
}

impl IntoIterator for ValidationReport {
    type Item = (String, Vec<String>);
    type IntoIter = std::collections::btree_map::IntoIter<String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
