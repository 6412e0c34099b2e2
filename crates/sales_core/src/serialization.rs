//! Canonical JSON for human-readable outputs
//!
//! Object keys are sorted recursively and the layout is fixed, so two runs
//! that produce the same report produce byte-identical files.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Map, Serializer, Value};
use std::io::{Read, Write};

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect::<Map<_, _>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Write `value` as canonical JSON
pub fn write_canonical_json<T: Serialize, W: Write>(
    writer: W,
    value: &T,
) -> Result<(), serde_json::Error> {
    let canonical = sort_keys(serde_json::to_value(value)?);
    let mut serializer = Serializer::with_formatter(writer, PrettyFormatter::with_indent(b"  "));
    canonical.serialize(&mut serializer)
}

/// Canonical JSON bytes of `value`
pub fn to_canonical_json(value: &impl Serialize) -> Result<Vec<u8>, serde_json::Error> {
    let mut buffer = Vec::new();
    write_canonical_json(&mut buffer, value)?;
    Ok(buffer)
}

pub fn read_json<T: DeserializeOwned, R: Read>(reader: R) -> Result<T, serde_json::Error> {
    serde_json::from_reader(reader)
}
