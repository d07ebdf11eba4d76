use std::collections::BTreeMap;
use std::iter::FromIterator;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::errors::MmmError;

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serializes a value into canonical JSON bytes with deterministic key ordering.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, MmmError> {
    let value = serde_json::to_value(value).map_err(|err| MmmError::serde("json-serialize", err))?;
    let canonical = canonicalize(value);
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonical)
        .map_err(|err| MmmError::serde("json-write", err))?;
    Ok(bytes)
}

/// Serializes a value into pretty JSON for report files.
pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<String, MmmError> {
    serde_json::to_string_pretty(value).map_err(|err| MmmError::serde("json-serialize", err))
}

/// Deserializes a value from JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, MmmError> {
    serde_json::from_slice(data).map_err(|err| MmmError::serde("json-deserialize", err))
}

/// Serializes a value into YAML.
pub fn to_yaml_string<T: Serialize>(value: &T) -> Result<String, MmmError> {
    serde_yaml::to_string(value).map_err(|err| MmmError::serde("yaml-serialize", err))
}

/// Deserializes a YAML payload into the requested type.
pub fn from_yaml_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, MmmError> {
    serde_yaml::from_slice(data).map_err(|err| MmmError::serde("yaml-deserialize", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_bytes_ignore_key_order() {
        let a = json!({"b": 1, "a": {"y": 2, "x": 3}});
        let b = json!({"a": {"x": 3, "y": 2}, "b": 1});
        assert_eq!(
            to_canonical_json_bytes(&a).unwrap(),
            to_canonical_json_bytes(&b).unwrap()
        );
    }
}
