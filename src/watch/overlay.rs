//! Overlay document parsing.
//!
//! The overlay file is one YAML mapping whose top-level keys replace the
//! same keys in every derived snapshot. Values stay raw YAML here; the
//! aggregate normalizes them on acceptance.

use std::collections::BTreeMap;

use serde_yaml::Value;

use crate::conf::normalize::key_string;

/// Parse error with enough context for the drop log line.
#[derive(Debug, thiserror::Error)]
pub enum OverlayParseError {
    #[error("unable to parse overlay document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("overlay document must be a mapping")]
    NotAMapping,
}

/// Parse the overlay document into its top-level keyed form.
///
/// Top-level keys are stringified the same way nested keys are during
/// normalization. An empty document is a valid, empty overlay.
pub fn parse_overlay(content: &str) -> Result<BTreeMap<String, Value>, OverlayParseError> {
    let value: Value = serde_yaml::from_str(content)?;
    match value {
        Value::Null => Ok(BTreeMap::new()),
        Value::Mapping(map) => Ok(map
            .into_iter()
            .map(|(k, v)| (key_string(&k), v))
            .collect()),
        _ => Err(OverlayParseError::NotAMapping),
    }
}
