// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Exporter configuration.
//!
//! Values come from a host-provided document (any serde format, keys in snake_case) or from
//! `MONITORING_EXPORTER_*` environment variables. Everything here is read-only once the
//! exporter is built.
//!
//! ```yaml
//! endpoint: http://collector:8080/ingest
//! logs_endpoint: https://logs.example.com/api/logs
//! timeout: 5s
//! headers:
//!   X-Api-Key: secret
//! retry:
//!   initial_backoff: 1s
//!   multiplier: 2.0
//!   max_backoff: 30s
//! queue:
//!   capacity: 1000
//!   num_workers: 10
//!   overflow_policy: drop_oldest
//! ```

use crate::errors::ConfigurationError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::error;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080/ingest";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_NUM_WORKERS: usize = 10;

const ENV_PREFIX: &str = "MONITORING_EXPORTER_";

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExporterConfig {
    /// Global base endpoint. `/v1/<signal>` is appended for signals without their own endpoint.
    pub endpoint: Option<String>,
    pub traces_endpoint: Option<String>,
    pub metrics_endpoint: Option<String>,
    pub logs_endpoint: Option<String>,
    /// Per-request timeout. Zero falls back to the 5s default.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Extra request headers. They override the JSON defaults on collision.
    pub headers: HashMap<String, String>,
    pub retry: RetryPolicy,
    pub queue: QueueConfig,
    /// When set, bodies are zstd-compressed at this level and sent with `Content-Encoding: zstd`.
    pub compression_level: Option<i32>,
    pub https_proxy: Option<String>,
    /// Retry every non-2xx status, including 4xx client errors.
    pub retry_client_errors: bool,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            endpoint: Some(DEFAULT_ENDPOINT.to_string()),
            traces_endpoint: None,
            metrics_endpoint: None,
            logs_endpoint: None,
            timeout: DEFAULT_TIMEOUT,
            headers: HashMap::new(),
            retry: RetryPolicy::default(),
            queue: QueueConfig::default(),
            compression_level: None,
            https_proxy: None,
            retry_client_errors: false,
        }
    }
}

/// Backoff settings shared by the three signal pipelines.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    pub multiplier: f64,
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    /// Jitter applied to every delay, as a fraction of it (0 disables jitter).
    pub randomization_factor: f64,
    /// Total attempts allowed for one payload, first attempt included.
    pub max_attempts: Option<u32>,
    /// Time budget measured from admission to the queue.
    #[serde(with = "humantime_serde")]
    pub max_elapsed_time: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(5),
            multiplier: 1.5,
            max_backoff: Duration::from_secs(30),
            randomization_factor: 0.5,
            max_attempts: None,
            max_elapsed_time: Some(Duration::from_secs(300)),
        }
    }
}

/// What to do when a signal queue is full.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait until a slot frees up.
    Block,
    /// Reject the incoming payload.
    #[default]
    DropNewest,
    /// Evict the oldest queued payload to make room.
    DropOldest,
}

impl FromStr for OverflowPolicy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "block" => Ok(OverflowPolicy::Block),
            "drop_newest" => Ok(OverflowPolicy::DropNewest),
            "drop_oldest" => Ok(OverflowPolicy::DropOldest),
            other => Err(ConfigurationError::InvalidValue {
                field: "queue.overflow_policy",
                reason: format!("unknown policy '{other}', expected block, drop_newest or drop_oldest"),
            }),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// Payloads owned by one signal queue at once, in-flight ones included.
    pub capacity: usize,
    /// Concurrent deliveries per signal.
    pub num_workers: usize,
    pub overflow_policy: OverflowPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            num_workers: DEFAULT_NUM_WORKERS,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

impl ExporterConfig {
    /// Builds a configuration from `MONITORING_EXPORTER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ExporterConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();

        if let Some(endpoint) = var("ENDPOINT") {
            config.endpoint = Some(endpoint);
        }
        config.traces_endpoint = var("TRACES_ENDPOINT");
        config.metrics_endpoint = var("METRICS_ENDPOINT");
        config.logs_endpoint = var("LOGS_ENDPOINT");

        if let Some(timeout_ms) = var("TIMEOUT_MS") {
            let millis = parse_number::<u64>("timeout", &timeout_ms)?;
            config.timeout = Duration::from_millis(millis);
        }
        if let Some(headers) = var("HEADERS") {
            config.headers = parse_headers(&headers);
        }
        if let Some(capacity) = var("QUEUE_CAPACITY") {
            config.queue.capacity = parse_number("queue.capacity", &capacity)?;
        }
        if let Some(workers) = var("NUM_WORKERS") {
            config.queue.num_workers = parse_number("queue.num_workers", &workers)?;
        }
        if let Some(policy) = var("OVERFLOW_POLICY") {
            config.queue.overflow_policy = policy.parse()?;
        }
        if let Some(level) = var("COMPRESSION_LEVEL") {
            config.compression_level = Some(parse_number("compression_level", &level)?);
        }
        config.https_proxy = var("HTTPS_PROXY").or_else(|| lookup("HTTPS_PROXY"));
        if let Some(retry) = var("RETRY_CLIENT_ERRORS") {
            config.retry_client_errors = retry.to_lowercase() == "true";
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks values that cannot be fixed up silently.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.queue.capacity == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "queue.capacity",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.queue.num_workers == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "queue.num_workers",
                reason: "must be greater than 0".to_string(),
            });
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(ConfigurationError::InvalidValue {
                field: "retry.multiplier",
                reason: format!("must be at least 1.0, got {}", self.retry.multiplier),
            });
        }
        if !(0.0..=1.0).contains(&self.retry.randomization_factor) {
            return Err(ConfigurationError::InvalidValue {
                field: "retry.randomization_factor",
                reason: format!(
                    "must be within [0, 1], got {}",
                    self.retry.randomization_factor
                ),
            });
        }
        if self.retry.initial_backoff > self.retry.max_backoff {
            return Err(ConfigurationError::InvalidValue {
                field: "retry.initial_backoff",
                reason: "must not exceed retry.max_backoff".to_string(),
            });
        }
        if self.retry.max_attempts == Some(0) {
            return Err(ConfigurationError::InvalidValue {
                field: "retry.max_attempts",
                reason: "must be greater than 0".to_string(),
            });
        }
        self.header_map()?;
        Ok(())
    }

    /// Configured headers as HTTP header values.
    pub fn header_map(&self) -> Result<HeaderMap, ConfigurationError> {
        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let invalid = |reason: String| ConfigurationError::InvalidHeader {
                name: name.clone(),
                reason,
            };
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }

    /// Configured timeout, or the default when unset.
    #[must_use]
    pub fn effective_timeout(&self) -> Duration {
        if self.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            self.timeout
        }
    }
}

fn parse_number<T: FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigurationError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigurationError::InvalidValue {
            field,
            reason: format!("'{raw}': {e}"),
        })
}

/// Parses `key=value` pairs separated by commas. Malformed pairs are logged and skipped.
fn parse_headers(raw: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                headers.insert(key.trim().to_string(), value.trim().to_string());
            }
            _ => error!("Ignoring malformed header '{}', expected key=value", pair),
        }
    }
    headers
}
