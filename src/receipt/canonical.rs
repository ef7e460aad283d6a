// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Canonical JSON encoding: sorted keys, no insignificant whitespace, UTF-8,
//! decimals as quoted strings. This is the only representation ever hashed
//! or signed, so leaf hashes are reproducible regardless of field insertion
//! order or serde's default map ordering.

use serde_json::Value;

/// Serializes `value` to its canonical form. Object keys are sorted
/// recursively; arrays keep their order. `serde_json::to_string` already
/// omits insignificant whitespace, so the only work left is key ordering.
pub fn canonicalize(value: &Value) -> String {
    let sorted = sort_keys(value);
    serde_json::to_string(&sorted).expect("canonical value always serializes")
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = serde_json::Map::new();
            for (k, v) in entries {
                sorted.insert(k.clone(), sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Encodes a `Cents` amount the way canonical JSON requires: a quoted
/// decimal string, never a bare float.
pub fn cents_to_json(cents: crate::types::Cents) -> Value {
    Value::String(cents.to_string())
}
