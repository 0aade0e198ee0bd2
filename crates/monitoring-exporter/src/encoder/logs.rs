// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::encoder::value::{attribute_to_json, attributes_to_json};
use crate::encoder::PayloadEncoder;
use crate::errors::EncodingError;
use crate::pdata::{LogRecord, Logs, Signal};
use serde_json::{json, Value};

/// Emits one record per log, each carrying a copy of its resource attributes.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogsEncoder;

impl PayloadEncoder for LogsEncoder {
    type Item = LogRecord;

    fn signal(&self) -> Signal {
        Signal::Logs
    }

    fn to_value(&self, logs: &Logs) -> Result<Value, EncodingError> {
        let mut records = Vec::with_capacity(logs.item_count());
        for (i, group) in logs.resource_groups.iter().enumerate() {
            let resource = Value::Object(attributes_to_json(
                &group.resource.attributes,
                None,
                &format!("resource[{i}]"),
            )?);
            for record in group.scope_groups.iter().flat_map(|sg| sg.items.iter()) {
                let path = format!("logs[{}]", records.len());
                records.push(json!({
                    "timestamp": record.time_unix_nano,
                    "severity": record.severity_text,
                    "body": attribute_to_json(&record.body, &format!("{path}.body"))?,
                    "attrs": attributes_to_json(&record.attributes, None, &format!("{path}.attrs"))?,
                    "resource": resource.clone(),
                }));
            }
        }
        Ok(json!({ "logs": records }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdata::{
        AttributeValue, InstrumentationScope, KeyValue, Resource, ResourceGroup, ScopeGroup,
    };

    fn log(body: &str, attributes: Vec<KeyValue>) -> LogRecord {
        LogRecord {
            time_unix_nano: 1_700_000_000_000_000_000,
            severity_text: "INFO".to_string(),
            body: body.into(),
            attributes,
            ..Default::default()
        }
    }

    fn logs(resource: Vec<KeyValue>, scopes: Vec<Vec<LogRecord>>) -> Logs {
        Logs::new(vec![ResourceGroup {
            resource: Resource {
                attributes: resource,
            },
            scope_groups: scopes
                .into_iter()
                .map(|items| ScopeGroup {
                    scope: InstrumentationScope::default(),
                    items,
                })
                .collect(),
        }])
    }

    #[test]
    fn test_attributes_survive_a_json_round_trip() {
        let record = log(
            "hello",
            vec![
                KeyValue::new("a", 1i64),
                KeyValue::new("b", "x"),
                KeyValue::new(
                    "c",
                    vec![AttributeValue::Bool(true), AttributeValue::Bool(false)],
                ),
            ],
        );
        let payload = LogsEncoder
            .encode(&logs(vec![], vec![vec![record]]))
            .expect("encode");

        let parsed: Value = serde_json::from_slice(&payload.body).expect("valid json");
        assert_eq!(
            parsed["logs"][0]["attrs"],
            json!({"a": 1, "b": "x", "c": [true, false]})
        );
    }

    #[test]
    fn test_one_record_per_log_with_resource_denormalized() {
        let batch = logs(
            vec![KeyValue::new("service.name", "api")],
            vec![
                vec![log("first", vec![]), log("second", vec![])],
                vec![log("third", vec![])],
            ],
        );
        let value = LogsEncoder.to_value(&batch).expect("encode");
        let records = value["logs"].as_array().expect("array");

        assert_eq!(records.len(), 3);
        let bodies: Vec<&str> = records.iter().filter_map(|r| r["body"].as_str()).collect();
        assert_eq!(bodies, vec!["first", "second", "third"]);
        for record in records {
            // resource attributes keep their original names for logs
            assert_eq!(record["resource"], json!({"service.name": "api"}));
            assert_eq!(record["severity"], "INFO");
            assert_eq!(record["timestamp"], 1_700_000_000_000_000_000u64);
        }
    }

    #[test]
    fn test_structured_body_and_empty_severity() {
        let record = LogRecord {
            body: AttributeValue::Map(vec![KeyValue::new("event", "login")]),
            ..Default::default()
        };
        let value = LogsEncoder
            .to_value(&logs(vec![], vec![vec![record]]))
            .expect("encode");
        assert_eq!(
            value["logs"][0],
            json!({
                "timestamp": 0,
                "severity": "",
                "body": {"event": "login"},
                "attrs": {},
                "resource": {}
            })
        );
    }

    #[test]
    fn test_unset_body_is_null() {
        let value = LogsEncoder
            .to_value(&logs(vec![], vec![vec![LogRecord::default()]]))
            .expect("encode");
        assert_eq!(value["logs"][0]["body"], Value::Null);
    }
}
