mod connection_string;
mod document;

use crate::{bson::Document, bson_util::values_match};

/// Asserts that two concern documents have the same keys in the same order with equal values.
/// Numbers compare by value, since the fixtures don't pin down the width of each integer.
fn assert_concern_document_eq(actual: &Document, expected: &Document, description: &str) {
    let actual_keys: Vec<&String> = actual.keys().collect();
    let expected_keys: Vec<&String> = expected.keys().collect();
    assert_eq!(
        actual_keys, expected_keys,
        "field order mismatch (actual {}, expected {}): {}",
        actual, expected, description
    );

    for (key, expected_value) in expected {
        let actual_value = actual.get(key).unwrap();
        assert!(
            values_match(expected_value, actual_value),
            "field `{}` mismatch (actual {}, expected {}): {}",
            key,
            actual_value,
            expected_value,
            description
        );
    }
}
