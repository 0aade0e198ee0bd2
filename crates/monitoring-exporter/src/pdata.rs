// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory telemetry trees handed over by the instrumentation pipeline.
//!
//! Every signal shares the same shape: a list of resource groups, each holding the
//! resource attributes and a list of scope groups, each holding the signal items in the
//! order they were produced.

use std::fmt;

/// The three telemetry kinds, each delivered through its own pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    Traces,
    Metrics,
    Logs,
}

impl Signal {
    pub const ALL: [Signal; 3] = [Signal::Traces, Signal::Metrics, Signal::Logs];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Traces => "traces",
            Signal::Metrics => "metrics",
            Signal::Logs => "logs",
        }
    }

    /// Path appended to the global base endpoint, e.g. `/v1/traces`.
    #[must_use]
    pub fn path(&self) -> &'static str {
        match self {
            Signal::Traces => "/v1/traces",
            Signal::Metrics => "/v1/metrics",
            Signal::Logs => "/v1/logs",
        }
    }

    /// Upper-case prefix used on log lines.
    #[must_use]
    pub fn log_prefix(&self) -> &'static str {
        match self {
            Signal::Traces => "TRACES",
            Signal::Metrics => "METRICS",
            Signal::Logs => "LOGS",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute value variants. `Empty` stands for an unset value.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum AttributeValue {
    #[default]
    Empty,
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Array(Vec<AttributeValue>),
    Map(Vec<KeyValue>),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Double(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        AttributeValue::Bytes(value)
    }
}

impl From<Vec<AttributeValue>> for AttributeValue {
    fn from(value: Vec<AttributeValue>) -> Self {
        AttributeValue::Array(value)
    }
}

impl From<Vec<KeyValue>> for AttributeValue {
    fn from(value: Vec<KeyValue>) -> Self {
        AttributeValue::Map(value)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct KeyValue {
    pub key: String,
    pub value: AttributeValue,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered attribute list. Duplicate keys are allowed; the last one wins once flattened.
pub type Attributes = Vec<KeyValue>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resource {
    pub attributes: Attributes,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstrumentationScope {
    pub name: String,
    pub version: String,
    pub attributes: Attributes,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScopeGroup<T> {
    pub scope: InstrumentationScope,
    pub items: Vec<T>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResourceGroup<T> {
    pub resource: Resource,
    pub scope_groups: Vec<ScopeGroup<T>>,
}

/// One materialized batch of a signal.
#[derive(Clone, Debug, PartialEq)]
pub struct TelemetryTree<T> {
    pub resource_groups: Vec<ResourceGroup<T>>,
}

impl<T> Default for TelemetryTree<T> {
    fn default() -> Self {
        Self {
            resource_groups: Vec::new(),
        }
    }
}

impl<T> TelemetryTree<T> {
    #[must_use]
    pub fn new(resource_groups: Vec<ResourceGroup<T>>) -> Self {
        Self { resource_groups }
    }

    /// Walks every item in resource, scope, item order.
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.resource_groups
            .iter()
            .flat_map(|rg| rg.scope_groups.iter())
            .flat_map(|sg| sg.items.iter())
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.resource_groups
            .iter()
            .flat_map(|rg| rg.scope_groups.iter())
            .map(|sg| sg.items.len())
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }
}

pub type Traces = TelemetryTree<Span>;
pub type Metrics = TelemetryTree<Metric>;
pub type Logs = TelemetryTree<LogRecord>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpanKind {
    #[default]
    Unspecified,
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Span {
    pub trace_id: [u8; 16],
    pub span_id: [u8; 8],
    pub parent_span_id: Option<[u8; 8]>,
    pub name: String,
    pub kind: SpanKind,
    pub start_time_unix_nano: u64,
    pub end_time_unix_nano: u64,
    pub attributes: Attributes,
}

impl Span {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NumberValue {
    Int(i64),
    Double(f64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct NumberDataPoint {
    pub start_time_unix_nano: u64,
    pub time_unix_nano: u64,
    pub attributes: Attributes,
    pub value: NumberValue,
}

impl NumberDataPoint {
    #[must_use]
    pub fn new(time_unix_nano: u64, value: NumberValue) -> Self {
        Self {
            start_time_unix_nano: 0,
            time_unix_nano,
            attributes: Vec::new(),
            value,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AggregationTemporality {
    #[default]
    Unspecified,
    Delta,
    Cumulative,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistogramDataPoint {
    pub time_unix_nano: u64,
    pub attributes: Attributes,
    pub count: u64,
    pub sum: Option<f64>,
    pub bucket_counts: Vec<u64>,
    pub explicit_bounds: Vec<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SummaryDataPoint {
    pub time_unix_nano: u64,
    pub attributes: Attributes,
    pub count: u64,
    pub sum: f64,
    pub quantiles: Vec<(f64, f64)>,
}

/// Metric payloads. Only `Gauge` and `Sum` carry single numeric points.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricData {
    Gauge {
        data_points: Vec<NumberDataPoint>,
    },
    Sum {
        data_points: Vec<NumberDataPoint>,
        temporality: AggregationTemporality,
        is_monotonic: bool,
    },
    Histogram {
        data_points: Vec<HistogramDataPoint>,
        temporality: AggregationTemporality,
    },
    ExponentialHistogram {
        data_points: Vec<HistogramDataPoint>,
        temporality: AggregationTemporality,
    },
    Summary {
        data_points: Vec<SummaryDataPoint>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub data: MetricData,
}

impl Metric {
    pub fn gauge(name: impl Into<String>, data_points: Vec<NumberDataPoint>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            unit: String::new(),
            data: MetricData::Gauge { data_points },
        }
    }

    pub fn sum(
        name: impl Into<String>,
        data_points: Vec<NumberDataPoint>,
        temporality: AggregationTemporality,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            unit: String::new(),
            data: MetricData::Sum {
                data_points,
                temporality,
                is_monotonic: true,
            },
        }
    }

    /// Number data points for point-based metrics, `None` for every other kind.
    #[must_use]
    pub fn number_data_points(&self) -> Option<&[NumberDataPoint]> {
        match &self.data {
            MetricData::Gauge { data_points } | MetricData::Sum { data_points, .. } => {
                Some(data_points)
            }
            MetricData::Histogram { .. }
            | MetricData::ExponentialHistogram { .. }
            | MetricData::Summary { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LogRecord {
    pub time_unix_nano: u64,
    pub observed_time_unix_nano: u64,
    pub severity_number: i32,
    pub severity_text: String,
    pub body: AttributeValue,
    pub attributes: Attributes,
    pub trace_id: Option<[u8; 16]>,
    pub span_id: Option<[u8; 8]>,
}
