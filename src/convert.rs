//! Snapshot-to-overlay conversion.
//!
//! Turns an existing lmConf JSON document into the overlay document format,
//! so a hand-maintained gateway configuration can be adopted as the
//! controller's overlay source. String values pass through verbatim;
//! structured values become nested YAML.

use std::io::{Read, Write};

use serde_json::{Map, Value as JsonValue};
use serde_yaml::{Mapping, Value as YamlValue};

/// Error type for snapshot conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("unable to parse input: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unable to encode overlay document: {0}")]
    Encode(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read an lmConf JSON document and write the equivalent overlay YAML.
pub fn run(input: impl Read, output: impl Write) -> Result<(), ConvertError> {
    let doc: Map<String, JsonValue> = serde_json::from_reader(input)?;

    let mut overlay = Mapping::new();
    for (key, value) in doc {
        overlay.insert(YamlValue::String(key), serde_yaml::to_value(value)?);
    }
    serde_yaml::to_writer(output, &YamlValue::Mapping(overlay))?;
    Ok(())
}
