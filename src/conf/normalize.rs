//! Overlay document normalization.
//!
//! The overlay source format is YAML, whose mappings may carry non-string
//! keys (numbers, booleans). The persisted snapshot format requires string
//! keys throughout, so every overlay value is converted to a JSON value
//! with each mapping key stringified recursively before it enters the
//! aggregate.

use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

/// Convert a YAML value into a strictly string-keyed JSON value.
///
/// Sequences normalize element-wise, mappings stringify every key and
/// recurse into every value, scalars pass through unchanged. Total over any
/// finite acyclic input.
pub fn normalize(value: &YamlValue) -> JsonValue {
    match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(b) => JsonValue::Bool(*b),
        YamlValue::Number(n) => normalize_number(n),
        YamlValue::String(s) => JsonValue::String(s.clone()),
        YamlValue::Sequence(seq) => JsonValue::Array(seq.iter().map(normalize).collect()),
        YamlValue::Mapping(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(key_string(k), normalize(v));
            }
            JsonValue::Object(out)
        }
        YamlValue::Tagged(tagged) => normalize(&tagged.value),
    }
}

/// Canonical string form of a mapping key.
pub(crate) fn key_string(key: &YamlValue) -> String {
    match key {
        YamlValue::String(s) => s.clone(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Null => "null".to_string(),
        // Composite keys are not produced by the overlay source format in
        // practice; fall back to their YAML rendering.
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn normalize_number(n: &serde_yaml::Number) -> JsonValue {
    if let Some(i) = n.as_i64() {
        JsonValue::Number(i.into())
    } else if let Some(u) = n.as_u64() {
        JsonValue::Number(u.into())
    } else if let Some(f) = n.as_f64() {
        match serde_json::Number::from_f64(f) {
            Some(num) => JsonValue::Number(num),
            // NaN/infinity have no JSON representation
            None => JsonValue::Null,
        }
    } else {
        JsonValue::Null
    }
}
