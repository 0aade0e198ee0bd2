// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::EncodingError;
use crate::pdata::{AttributeValue, KeyValue};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Number, Value};

/// Converts an attribute value into its JSON form.
///
/// Bytes become a base64 string, unset values become `null`. `path` only feeds error
/// messages.
pub fn attribute_to_json(value: &AttributeValue, path: &str) -> Result<Value, EncodingError> {
    Ok(match value {
        AttributeValue::Empty => Value::Null,
        AttributeValue::String(s) => Value::String(s.clone()),
        AttributeValue::Int(i) => Value::Number((*i).into()),
        AttributeValue::Double(d) => double_to_json(*d, path)?,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Bytes(bytes) => Value::String(STANDARD.encode(bytes)),
        AttributeValue::Array(values) => Value::Array(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| attribute_to_json(v, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        AttributeValue::Map(kvs) => Value::Object(attributes_to_json(kvs, None, path)?),
    })
}

/// Flattens an attribute list into a JSON object, renaming keys found in `rename`.
/// Later duplicates overwrite earlier ones.
pub fn attributes_to_json(
    attributes: &[KeyValue],
    rename: Option<&[(&str, &str)]>,
    path: &str,
) -> Result<Map<String, Value>, EncodingError> {
    let mut out = Map::new();
    for kv in attributes {
        let key = rename
            .and_then(|table| table.iter().find(|(from, _)| *from == kv.key))
            .map_or(kv.key.as_str(), |(_, to)| *to);
        let value = attribute_to_json(&kv.value, &format!("{path}.{}", kv.key))?;
        out.insert(key.to_string(), value);
    }
    Ok(out)
}

pub fn double_to_json(value: f64, path: &str) -> Result<Value, EncodingError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| EncodingError::NonFiniteNumber {
            path: path.to_string(),
        })
}
