// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::encoder::value::{attributes_to_json, double_to_json};
use crate::encoder::PayloadEncoder;
use crate::errors::EncodingError;
use crate::pdata::{Metric, Metrics, NumberDataPoint, NumberValue, ResourceGroup, Signal};
use serde_json::{json, Map, Value};

/// Well-known resource attributes renamed in the `properties` object.
pub const PROPERTY_RENAMES: &[(&str, &str)] = &[
    ("service.name", "service"),
    ("deployment.environment", "environment"),
    ("cloud.region", "region"),
];

/// Flattens each resource group into one record holding the latest value of every gauge and
/// sum. Histograms, exponential histograms and summaries are left out.
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricsEncoder;

impl PayloadEncoder for MetricsEncoder {
    type Item = Metric;

    fn signal(&self) -> Signal {
        Signal::Metrics
    }

    fn to_value(&self, metrics: &Metrics) -> Result<Value, EncodingError> {
        let records = metrics
            .resource_groups
            .iter()
            .enumerate()
            .map(|(i, group)| resource_record(group, i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(json!({ "metrics": records }))
    }
}

fn resource_record(group: &ResourceGroup<Metric>, index: usize) -> Result<Value, EncodingError> {
    let path = format!("metrics[{index}]");
    let properties = attributes_to_json(
        &group.resource.attributes,
        Some(PROPERTY_RENAMES),
        &format!("{path}.properties"),
    )?;

    let mut values = Map::new();
    let mut timestamp = 0u64;
    for metric in group.scope_groups.iter().flat_map(|sg| sg.items.iter()) {
        let Some(point) = metric.number_data_points().and_then(latest_point) else {
            continue;
        };
        let value = match point.value {
            NumberValue::Int(i) => Value::Number(i.into()),
            NumberValue::Double(d) => {
                double_to_json(d, &format!("{path}.values.{}", metric.name))?
            }
        };
        values.insert(metric.name.clone(), value);
        timestamp = timestamp.max(point.time_unix_nano);
    }

    Ok(json!({
        "timestamp": timestamp,
        "properties": properties,
        "values": values,
    }))
}

/// Point with the greatest timestamp. On ties the one listed last wins.
fn latest_point(points: &[NumberDataPoint]) -> Option<&NumberDataPoint> {
    points.iter().max_by_key(|p| p.time_unix_nano)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdata::{
        AggregationTemporality, HistogramDataPoint, InstrumentationScope, KeyValue, MetricData,
        Resource, ScopeGroup,
    };

    fn group(attributes: Vec<KeyValue>, metrics: Vec<Metric>) -> ResourceGroup<Metric> {
        ResourceGroup {
            resource: Resource { attributes },
            scope_groups: vec![ScopeGroup {
                scope: InstrumentationScope::default(),
                items: metrics,
            }],
        }
    }

    fn point(ts: u64, value: NumberValue) -> NumberDataPoint {
        NumberDataPoint::new(ts, value)
    }

    #[test]
    fn test_latest_point_wins_regardless_of_order() {
        for points in [
            vec![point(100, NumberValue::Int(1)), point(200, NumberValue::Int(2))],
            vec![point(200, NumberValue::Int(2)), point(100, NumberValue::Int(1))],
        ] {
            let metrics = Metrics::new(vec![group(vec![], vec![Metric::gauge("cpu", points)])]);
            let value = MetricsEncoder.to_value(&metrics).expect("encode");
            assert_eq!(value["metrics"][0]["values"]["cpu"], 2);
            assert_eq!(value["metrics"][0]["timestamp"], 200);
        }
    }

    #[test]
    fn test_properties_rename_well_known_attributes() {
        let metrics = Metrics::new(vec![group(
            vec![
                KeyValue::new("service.name", "checkout"),
                KeyValue::new("deployment.environment", "prod"),
                KeyValue::new("cloud.region", "eu-west-1"),
                KeyValue::new("host.name", "web-1"),
            ],
            vec![],
        )]);
        let value = MetricsEncoder.to_value(&metrics).expect("encode");
        assert_eq!(
            value["metrics"][0],
            json!({
                "timestamp": 0,
                "properties": {
                    "service": "checkout",
                    "environment": "prod",
                    "region": "eu-west-1",
                    "host.name": "web-1"
                },
                "values": {}
            })
        );
    }

    #[test]
    fn test_number_kinds_preserved_and_timestamp_is_group_max() {
        let metrics = Metrics::new(vec![group(
            vec![],
            vec![
                Metric::gauge("temp", vec![point(300, NumberValue::Double(21.5))]),
                Metric::sum(
                    "requests",
                    vec![point(500, NumberValue::Int(42))],
                    AggregationTemporality::Cumulative,
                ),
                Metric::sum(
                    "errors",
                    vec![point(400, NumberValue::Int(3))],
                    AggregationTemporality::Delta,
                ),
            ],
        )]);
        let value = MetricsEncoder.to_value(&metrics).expect("encode");
        let record = &value["metrics"][0];
        assert!(record["values"]["temp"].is_f64());
        assert_eq!(record["values"]["temp"], 21.5);
        assert!(record["values"]["requests"].is_i64());
        assert_eq!(record["values"]["requests"], 42);
        assert_eq!(record["values"]["errors"], 3);
        assert_eq!(record["timestamp"], 500);
    }

    #[test]
    fn test_other_metric_types_are_skipped() {
        let histogram = Metric {
            name: "latency".to_string(),
            description: String::new(),
            unit: "ms".to_string(),
            data: MetricData::Histogram {
                data_points: vec![HistogramDataPoint {
                    time_unix_nano: 900,
                    count: 4,
                    ..Default::default()
                }],
                temporality: AggregationTemporality::Delta,
            },
        };
        let empty_gauge = Metric::gauge("idle", vec![]);
        let metrics = Metrics::new(vec![group(vec![], vec![histogram, empty_gauge])]);

        let value = MetricsEncoder.to_value(&metrics).expect("encode");
        assert_eq!(value["metrics"][0]["values"], json!({}));
        assert_eq!(value["metrics"][0]["timestamp"], 0);
    }

    #[test]
    fn test_one_record_per_resource_group() {
        let metrics = Metrics::new(vec![
            group(
                vec![KeyValue::new("service.name", "a")],
                vec![Metric::gauge("x", vec![point(1, NumberValue::Int(1))])],
            ),
            group(
                vec![KeyValue::new("service.name", "b")],
                vec![Metric::gauge("x", vec![point(2, NumberValue::Int(2))])],
            ),
        ]);
        let value = MetricsEncoder.to_value(&metrics).expect("encode");
        let records = value["metrics"].as_array().expect("array");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["properties"]["service"], "a");
        assert_eq!(records[1]["properties"]["service"], "b");
    }

    #[test]
    fn test_non_finite_value_fails_the_batch() {
        let metrics = Metrics::new(vec![group(
            vec![],
            vec![Metric::gauge("bad", vec![point(1, NumberValue::Double(f64::INFINITY))])],
        )]);
        assert!(matches!(
            MetricsEncoder.to_value(&metrics),
            Err(EncodingError::NonFiniteNumber { .. })
        ));
    }
}
