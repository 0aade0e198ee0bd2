// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::pdata::Signal;

/// Raised while building an exporter. Never raised at send time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error(
        "missing endpoints: traces={traces:?} metrics={metrics:?} logs={logs:?} \
         (set a specific *_endpoint or a global endpoint)"
    )]
    MissingEndpoints {
        traces: String,
        metrics: String,
        logs: String,
    },

    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("unable to build HTTP client: {0}")]
    HttpClient(String),
}

/// A batch that cannot be turned into a JSON body. Fatal for that batch.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("non-finite number at {path}")]
    NonFiniteNumber { path: String },

    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to compress payload: {0}")]
    Compress(#[from] std::io::Error),
}

/// Outcome of a single failed HTTP attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeliveryError {
    #[error("http post failed: {message}")]
    Transport { message: String, timeout: bool },

    #[error("http status={status} body={body:?}")]
    HttpStatus { status: u16, body: String },
}

impl DeliveryError {
    /// Transport failures and 408, 429 and 5xx are retryable. Other statuses are permanent
    /// unless `retry_client_errors` is set, in which case every non-2xx is retried.
    #[must_use]
    pub fn is_retryable(&self, retry_client_errors: bool) -> bool {
        match self {
            DeliveryError::Transport { .. } => true,
            DeliveryError::HttpStatus { status, .. } => {
                retry_client_errors || matches!(*status, 408 | 429 | 500..=599)
            }
        }
    }
}

/// Returned to the caller of an `export_*` entry point.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to encode {signal} payload: {source}")]
    Encoding {
        signal: Signal,
        #[source]
        source: EncodingError,
    },

    #[error("{signal} queue is full (capacity {capacity})")]
    QueueOverflow { signal: Signal, capacity: usize },

    #[error("exporter is shutting down")]
    ShuttingDown,
}
