// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-signal endpoint resolution.

use crate::config::ExporterConfig;
use crate::errors::ConfigurationError;
use crate::pdata::Signal;
use tracing::debug;

/// Destination of each signal. `None` means the signal is silently discarded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EndpointSet {
    pub traces: Option<String>,
    pub metrics: Option<String>,
    pub logs: Option<String>,
}

impl EndpointSet {
    /// Resolves the three endpoints from the configuration.
    ///
    /// A non-blank signal endpoint is used verbatim (trimmed). Otherwise a non-blank global
    /// endpoint is used with trailing slashes removed and `/v1/<signal>` appended. Fails when
    /// no signal ends up with a destination.
    pub fn resolve(config: &ExporterConfig) -> Result<Self, ConfigurationError> {
        let base = non_blank(config.endpoint.as_deref()).map(|e| e.trim_end_matches('/'));

        let resolve_one = |specific: Option<&str>, signal: Signal| -> Option<String> {
            match non_blank(specific) {
                Some(url) => Some(url.to_string()),
                None => base.map(|b| format!("{b}{}", signal.path())),
            }
        };

        let endpoints = Self {
            traces: resolve_one(config.traces_endpoint.as_deref(), Signal::Traces),
            metrics: resolve_one(config.metrics_endpoint.as_deref(), Signal::Metrics),
            logs: resolve_one(config.logs_endpoint.as_deref(), Signal::Logs),
        };

        if endpoints.traces.is_none() && endpoints.metrics.is_none() && endpoints.logs.is_none() {
            let raw = |value: &Option<String>| value.clone().unwrap_or_default();
            return Err(ConfigurationError::MissingEndpoints {
                traces: raw(&config.traces_endpoint),
                metrics: raw(&config.metrics_endpoint),
                logs: raw(&config.logs_endpoint),
            });
        }

        for signal in Signal::ALL {
            match endpoints.get(signal) {
                Some(url) => debug!("{} | Exporting to {}", signal.log_prefix(), url),
                None => debug!("{} | No endpoint, signal will be discarded", signal.log_prefix()),
            }
        }

        Ok(endpoints)
    }

    #[must_use]
    pub fn get(&self, signal: Signal) -> Option<&str> {
        match signal {
            Signal::Traces => self.traces.as_deref(),
            Signal::Metrics => self.metrics.as_deref(),
            Signal::Logs => self.logs.as_deref(),
        }
    }
}

/// Trims `value` and drops it when nothing is left.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config(
        endpoint: Option<&str>,
        traces: Option<&str>,
        metrics: Option<&str>,
        logs: Option<&str>,
    ) -> ExporterConfig {
        ExporterConfig {
            endpoint: endpoint.map(str::to_string),
            traces_endpoint: traces.map(str::to_string),
            metrics_endpoint: metrics.map(str::to_string),
            logs_endpoint: logs.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_global_endpoint_derives_signal_paths() {
        let endpoints = EndpointSet::resolve(&config(Some("http://host:4318///"), None, None, None))
            .expect("should resolve");
        assert_eq!(endpoints.traces.as_deref(), Some("http://host:4318/v1/traces"));
        assert_eq!(endpoints.metrics.as_deref(), Some("http://host:4318/v1/metrics"));
        assert_eq!(endpoints.logs.as_deref(), Some("http://host:4318/v1/logs"));
    }

    #[test]
    fn test_specific_endpoint_wins_and_is_trimmed() {
        let endpoints = EndpointSet::resolve(&config(
            Some("http://base"),
            Some("  http://traces.example.com/custom/  "),
            None,
            Some(""),
        ))
        .expect("should resolve");
        assert_eq!(
            endpoints.traces.as_deref(),
            Some("http://traces.example.com/custom/")
        );
        assert_eq!(endpoints.metrics.as_deref(), Some("http://base/v1/metrics"));
        // blank specific endpoint falls back to the global one
        assert_eq!(endpoints.logs.as_deref(), Some("http://base/v1/logs"));
    }

    #[test]
    fn test_partial_endpoints_leave_others_absent() {
        let endpoints = EndpointSet::resolve(&config(None, None, Some("http://m/in"), None))
            .expect("should resolve");
        assert_eq!(endpoints.get(Signal::Traces), None);
        assert_eq!(endpoints.get(Signal::Metrics), Some("http://m/in"));
        assert_eq!(endpoints.get(Signal::Logs), None);
    }

    #[test]
    fn test_no_endpoints_fails() {
        let result = EndpointSet::resolve(&config(Some("   "), Some(""), None, Some(" ")));
        match result {
            Err(ConfigurationError::MissingEndpoints {
                traces,
                metrics,
                logs,
            }) => {
                assert_eq!(traces, "");
                assert_eq!(metrics, "");
                assert_eq!(logs, " ");
            }
            other => panic!("expected MissingEndpoints, got {other:?}"),
        }
    }

    fn url() -> impl Strategy<Value = String> {
        "https?://[a-z]{1,10}(:[0-9]{2,5})?(/[a-z]{1,6}){0,3}/{0,3}"
    }

    proptest! {
        #[test]
        fn prop_specific_endpoint_is_used_verbatim(global in proptest::option::of(url()), specific in url()) {
            let endpoints = EndpointSet::resolve(&config(global.as_deref(), Some(&specific), Some(&specific), Some(&specific)))
                .expect("should resolve");
            prop_assert_eq!(endpoints.traces.as_deref(), Some(specific.as_str()));
            prop_assert_eq!(endpoints.metrics.as_deref(), Some(specific.as_str()));
            prop_assert_eq!(endpoints.logs.as_deref(), Some(specific.as_str()));
        }

        #[test]
        fn prop_global_endpoint_is_trimmed_and_suffixed(global in url()) {
            let endpoints = EndpointSet::resolve(&config(Some(&global), None, None, None))
                .expect("should resolve");
            let base = global.trim_end_matches('/');
            prop_assert_eq!(endpoints.traces, Some(format!("{base}/v1/traces")));
            prop_assert_eq!(endpoints.metrics, Some(format!("{base}/v1/metrics")));
            prop_assert_eq!(endpoints.logs, Some(format!("{base}/v1/logs")));
        }
    }
}
