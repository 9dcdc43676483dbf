//! Dotted field paths over JSON payloads.
//!
//! A path such as `shipping_costs.2.cost` addresses one value. A pattern such
//! as `shipping_costs.*.cost` is expanded against a payload into the concrete
//! paths it currently matches. Numeric segments are ordinary keys: they index
//! arrays and match string keys of objects alike.

use serde_json::{Map, Value};

/// The wildcard segment.
pub const WILDCARD: &str = "*";

/// Returns true when the path contains at least one `*` segment.
pub fn is_pattern(path: &str) -> bool {
    path.split('.').any(|segment| segment == WILDCARD)
}

/// Expands a pattern into the concrete paths present in `payload`.
///
/// A path without wildcards is returned as-is, whether or not it exists.
/// Each `*` enumerates the indices (arrays) or keys (objects) of the node at
/// that position; a branch whose node is missing or scalar yields nothing.
/// Literal segments after the last wildcard are appended without checking
/// that they exist, so a missing leaf still gets a path and `required` can
/// report it.
///
/// ```
/// use payload_policy::path::expand;
/// use serde_json::json;
///
/// let payload = json!({"items": [{"amount": 1}, {}]});
/// assert_eq!(expand("items.*.amount", &payload), vec!["items.0.amount", "items.1.amount"]);
/// assert_eq!(expand("title", &payload), vec!["title"]);
/// ```
pub fn expand(pattern: &str, payload: &Value) -> Vec<String> {
    if !is_pattern(pattern) {
        return vec![pattern.to_string()];
    }

    let segments: Vec<&str> = pattern.split('.').collect();
    let last_wildcard = segments
        .iter()
        .rposition(|segment| *segment == WILDCARD)
        .unwrap_or(0);

    let mut out = Vec::new();
    walk(
        payload,
        &segments[..=last_wildcard],
        String::new(),
        &mut out,
    );

    let tail = segments[last_wildcard + 1..].join(".");
    if tail.is_empty() {
        out
    } else {
        out.into_iter().map(|head| join(&head, &tail)).collect()
    }
}

fn walk(node: &Value, segments: &[&str], prefix: String, out: &mut Vec<String>) {
    let Some((segment, rest)) = segments.split_first() else {
        out.push(prefix);
        return;
    };

    if *segment == WILDCARD {
        match node {
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    walk(item, rest, join(&prefix, &index.to_string()), out);
                }
            }
            Value::Object(map) => {
                for (key, item) in map {
                    walk(item, rest, join(&prefix, key), out);
                }
            }
            _ => {}
        }
        return;
    }

    if let Some(next) = child(node, segment) {
        walk(next, rest, join(&prefix, segment), out);
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

/// Reads the value at a concrete path.
pub fn get<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(payload);
    }
    path.split('.')
        .try_fold(payload, |node, segment| child(node, segment))
}

/// Mutable access to the value at a concrete path.
pub fn get_mut<'a>(payload: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    if path.is_empty() {
        return Some(payload);
    }
    path.split('.')
        .try_fold(payload, |node, segment| child_mut(node, segment))
}

/// Writes `value` at a concrete path, creating intermediate objects.
///
/// A numeric segment on an array replaces the element at that index, or
/// appends when the index equals the array length. Scalars met along the
/// way are replaced by objects.
pub fn set(payload: &mut Value, path: &str, value: Value) {
    let slot = path.split('.').fold(payload, step);
    *slot = value;
}

fn step<'a>(node: &'a mut Value, segment: &str) -> &'a mut Value {
    let index = match (&*node, segment.parse::<usize>()) {
        (Value::Array(items), Ok(index)) if index <= items.len() => Some(index),
        _ => None,
    };

    match (node, index) {
        (Value::Array(items), Some(index)) => {
            if index == items.len() {
                items.push(Value::Null);
            }
            &mut items[index]
        }
        (node, _) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            // A `Value::Object` never panics on string indexing.
            &mut node[segment]
        }
    }
}

/// Returns the path of the node holding `path`, or `""` at the root.
pub fn parent(path: &str) -> &str {
    path.rsplit_once('.').map_or("", |(head, _)| head)
}

/// Returns the last segment of a path.
pub fn leaf(path: &str) -> &str {
    path.rsplit_once('.').map_or(path, |(_, tail)| tail)
}

/// Returns the concrete collections the innermost wildcard of `pattern`
/// iterates over in `payload`.
///
/// When an enclosing wildcard matches nothing, the search moves out one
/// level, so `tiers.*.options.*.amount` gives `tiers.N.options` for every
/// tier, or `tiers` when there are none. A leading wildcard resolves to the
/// root, spelled `""`. A path without wildcards has no collections.
///
/// ```
/// use payload_policy::path::enclosing_collections;
/// use serde_json::json;
///
/// let pattern = "tiers.*.options.*.amount";
/// let payload = json!({"tiers": [{"options": []}, {}]});
/// assert_eq!(
///     enclosing_collections(pattern, &payload),
///     vec!["tiers.0.options", "tiers.1.options"]
/// );
/// assert_eq!(enclosing_collections(pattern, &json!({"tiers": []})), vec!["tiers"]);
/// ```
pub fn enclosing_collections(pattern: &str, payload: &Value) -> Vec<String> {
    let segments: Vec<&str> = pattern.split('.').collect();
    let mut end = segments.len();
    while let Some(wildcard) = segments[..end].iter().rposition(|s| *s == WILDCARD) {
        let prefix = segments[..wildcard].join(".");
        if prefix.is_empty() {
            return vec![String::new()];
        }
        let parents = expand(&prefix, payload);
        if !parents.is_empty() {
            return parents;
        }
        end = wildcard;
    }
    Vec::new()
}

/// Returns true when `path` lies strictly below `ancestor`. Every path
/// lies below the root `""`.
pub fn is_below(path: &str, ancestor: &str) -> bool {
    ancestor.is_empty()
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Replaces the wildcards of `pattern` with the indices used by `concrete`.
///
/// Used to resolve sibling references under the same repeated element:
/// with `concrete = "tiers.3.max"`, the reference `tiers.*.min` resolves to
/// `tiers.3.min`. Extra wildcards stay untouched.
pub fn bind_wildcards(pattern: &str, concrete: &str) -> String {
    let concrete: Vec<&str> = concrete.split('.').collect();
    pattern
        .split('.')
        .enumerate()
        .map(|(i, segment)| match (segment, concrete.get(i)) {
            (WILDCARD, Some(bound)) => *bound,
            _ => segment,
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// A human label for messages: the last non-numeric segment, with
/// underscores and dashes turned into spaces.
/// The root path `""` reads as `payload`.
pub fn label(path: &str) -> String {
    if path.is_empty() {
        return "payload".to_string();
    }
    path.rsplit('.')
        .find(|segment| segment.parse::<usize>().is_err() && *segment != WILDCARD)
        .unwrap_or(path)
        .replace(['_', '-'], " ")
}
