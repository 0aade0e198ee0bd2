// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Entry point handed to the instrumentation pipeline.

use crate::config::ExporterConfig;
use crate::encoder::{LogsEncoder, MetricsEncoder, PayloadEncoder, TracesEncoder};
use crate::endpoint::EndpointSet;
use crate::errors::{ConfigurationError, ExportError};
use crate::pdata::{Logs, Metrics, Signal, Traces};
use crate::pipeline::{PipelineSettings, SignalPipeline};
use crate::stats::{DeliveryStats, SignalStatsSnapshot};
use crate::transport::{HttpTransport, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub struct MonitoringExporter {
    endpoints: EndpointSet,
    compression_level: Option<i32>,
    traces: Option<SignalPipeline>,
    metrics: Option<SignalPipeline>,
    logs: Option<SignalPipeline>,
    stats: Arc<DeliveryStats>,
    cancel: CancellationToken,
}

impl MonitoringExporter {
    /// Validates `config`, resolves endpoints and starts one pipeline per routed signal.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ExporterConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Same as [`MonitoringExporter::new`] with a caller-provided transport.
    pub fn with_transport(
        config: ExporterConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let endpoints = EndpointSet::resolve(&config)?;
        let stats = Arc::new(DeliveryStats::default());
        let cancel = CancellationToken::new();

        let start = |signal: Signal| {
            endpoints.get(signal).map(|url| {
                SignalPipeline::start(
                    PipelineSettings {
                        signal,
                        url: url.to_string(),
                        retry: config.retry.clone(),
                        retry_client_errors: config.retry_client_errors,
                    },
                    &config.queue,
                    Arc::clone(&transport),
                    Arc::clone(stats.signal(signal)),
                    cancel.child_token(),
                )
            })
        };
        let traces = start(Signal::Traces);
        let metrics = start(Signal::Metrics);
        let logs = start(Signal::Logs);

        Ok(Self {
            endpoints,
            compression_level: config.compression_level,
            traces,
            metrics,
            logs,
            stats,
            cancel,
        })
    }

    pub async fn export_traces(&self, traces: &Traces) -> Result<(), ExportError> {
        self.export(&TracesEncoder, traces).await
    }

    pub async fn export_metrics(&self, metrics: &Metrics) -> Result<(), ExportError> {
        self.export(&MetricsEncoder, metrics).await
    }

    pub async fn export_logs(&self, logs: &Logs) -> Result<(), ExportError> {
        self.export(&LogsEncoder, logs).await
    }

    /// Encodes the batch and admits it to the signal's queue. Delivery happens in the
    /// background; the returned result only covers encoding and admission.
    async fn export<E: PayloadEncoder>(
        &self,
        encoder: &E,
        tree: &crate::pdata::TelemetryTree<E::Item>,
    ) -> Result<(), ExportError> {
        let signal = encoder.signal();
        let Some(pipeline) = self.pipeline(signal) else {
            debug!(
                "{} | No endpoint configured, discarding {} items",
                signal.log_prefix(),
                tree.item_count()
            );
            return Ok(());
        };

        let encoded = encoder.encode(tree).and_then(|payload| match self.compression_level {
            Some(level) => payload.compress(level),
            None => Ok(payload),
        });
        let payload = match encoded {
            Ok(payload) => payload,
            Err(source) => {
                error!(
                    signal = %signal,
                    url = %pipeline.url(),
                    outcome = "drop",
                    "{} | Failed to encode batch of {} items: {}",
                    signal.log_prefix(),
                    tree.item_count(),
                    source
                );
                self.stats.signal(signal).record_dropped(1);
                return Err(ExportError::Encoding { signal, source });
            }
        };

        debug!(
            "{} | Encoded {} items into {} bytes",
            signal.log_prefix(),
            payload.item_count,
            payload.len()
        );
        pipeline.enqueue(payload).await
    }

    /// Stops admission on every signal, then drains the queues concurrently within `grace`.
    ///
    /// Whatever is still queued or in flight when the grace period runs out is aborted and
    /// counted as dropped. Calling it again is a no-op.
    pub async fn shutdown(&self, grace: Duration) {
        let pipelines = [&self.traces, &self.metrics, &self.logs];
        for pipeline in pipelines.into_iter().flatten() {
            pipeline.close();
        }
        tokio::join!(
            shutdown_pipeline(self.traces.as_ref(), grace),
            shutdown_pipeline(self.metrics.as_ref(), grace),
            shutdown_pipeline(self.logs.as_ref(), grace),
        );
        self.cancel.cancel();
        debug!("Monitoring exporter stopped");
    }

    #[must_use]
    pub fn stats(&self, signal: Signal) -> SignalStatsSnapshot {
        self.stats.snapshot(signal)
    }

    #[must_use]
    pub fn endpoints(&self) -> &EndpointSet {
        &self.endpoints
    }

    fn pipeline(&self, signal: Signal) -> Option<&SignalPipeline> {
        match signal {
            Signal::Traces => self.traces.as_ref(),
            Signal::Metrics => self.metrics.as_ref(),
            Signal::Logs => self.logs.as_ref(),
        }
    }
}

async fn shutdown_pipeline(pipeline: Option<&SignalPipeline>, grace: Duration) {
    if let Some(pipeline) = pipeline {
        pipeline.shutdown(grace).await;
    }
}

impl Drop for MonitoringExporter {
    fn drop(&mut self) {
        // workers must not outlive the exporter
        self.cancel.cancel();
    }
}
