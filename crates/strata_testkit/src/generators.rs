//! Property-based test generators using proptest.
//!
//! Strategies produce values the codec round-trips exactly: mappings come
//! out in canonical key order and carry no duplicate keys, and JSON
//! documents are parsed.

use proptest::prelude::*;
use strata_codec::{JsonDoc, Value};

/// Strategy for short byte strings, printable or not.
pub fn bytes_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..24)
}

/// Strategy for mapping keys.
pub fn key_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-z!]{1,8}".prop_map(Value::bytes),
        "[a-z]{1,8}".prop_map(Value::Text),
        any::<i64>().prop_map(Value::Integer),
    ]
}

/// Strategy for small JSON documents.
pub fn json_strategy() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i32>().prop_map(serde_json::Value::from),
        "[a-z ]{0,12}".prop_map(serde_json::Value::from),
        prop::collection::vec(any::<u16>(), 0..4).prop_map(serde_json::Value::from),
    ]
}

/// Strategy for scalar values.
pub fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Integer),
        bytes_strategy().prop_map(Value::Bytes),
        ".{0,12}".prop_map(Value::Text),
        any::<bool>().prop_map(Value::Bool),
        json_strategy().prop_map(|doc| Value::Json(JsonDoc::Parsed(doc))),
    ]
}

/// Strategy for nested values built from lists and mappings.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::List),
            prop::collection::vec((key_strategy(), inner), 0..6).prop_map(|pairs| {
                let mut pairs = pairs;
                pairs.sort_by(|a, b| a.0.cmp_canonical(&b.0));
                pairs.dedup_by(|a, b| a.0.cmp_canonical(&b.0).is_eq());
                Value::Map(pairs)
            }),
        ]
    })
}

/// Strategy for a batch of short text items, as pushed to an event log.
pub fn text_batch_strategy() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec("[a-z0-9]{1,6}".prop_map(Value::Text), 1..8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_codec::{decode, encode};

    proptest! {
        #[test]
        fn generated_values_round_trip(value in value_strategy()) {
            let encoded = encode(&value).unwrap();
            prop_assert_eq!(decode(&encoded).unwrap(), value);
        }
    }
}
