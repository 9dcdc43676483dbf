//! Shared proptest strategies.

use proptest::prelude::*;
use serde_json::{Map, Value};

/// Short lowercase keys, so generated objects collide on names now and then.
pub(crate) fn arb_key() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,6}").unwrap()
}

/// Free text with markup, entities, control characters and odd spacing.
pub(crate) fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[ A-Za-z0-9.,@_-]{0,24}").unwrap(),
        prop::string::string_regex("[ a-z<>/\"=&;]{0,24}").unwrap(),
        prop::string::string_regex("[\t\n\r a-z\\x00-\\x08]{0,16}").unwrap(),
        Just("<script>alert(1)</script>hello".to_string()),
        Just("  <b>Clean</b>   water  ".to_string()),
    ]
}

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        (-1.0e6..1.0e6f64).prop_map(Value::from),
        arb_text().prop_map(Value::String),
    ]
}

/// Arbitrary JSON payloads up to a few levels deep.
pub(crate) fn arb_payload() -> impl Strategy<Value = Value> {
    arb_scalar().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(arb_key(), inner, 0..4)
                .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// An `{"items": [...]}` payload of objects carrying an `amount` field,
/// some of which are left out.
pub(crate) fn arb_items() -> impl Strategy<Value = Value> {
    prop::collection::vec(prop::option::of(arb_scalar()), 0..6).prop_map(|amounts| {
        let items = amounts
            .into_iter()
            .map(|amount| {
                let mut item = Map::new();
                if let Some(amount) = amount {
                    item.insert("amount".to_string(), amount);
                }
                Value::Object(item)
            })
            .collect();
        serde_json::json!({ "items": Value::Array(items) })
    })
}
