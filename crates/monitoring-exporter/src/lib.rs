// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Multi-signal telemetry export sink.
//!
//! Traces, metrics and logs handed over by an instrumentation pipeline are encoded to JSON,
//! admitted to a bounded per-signal queue and delivered by a pool of workers to HTTP
//! endpoints. Failed deliveries are retried with exponential backoff until the retry policy
//! gives up, at which point the payload is dropped and counted.
//!
//! ```text
//!   export_*(tree)
//!       │ encode
//!       v
//!   ┌─────────────┐   pop (ready time order)   ┌──────────┐   POST   ┌──────────┐
//!   │    Queue    │ ─────────────────────────> │  Worker  │ ───────> │ Endpoint │
//!   └─────────────┘ <───────────────────────── └──────────┘          └──────────┘
//!              reschedule with backoff (retryable failure)
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod encoder;
pub mod endpoint;
pub mod errors;
pub mod exporter;
pub mod pdata;
pub mod pipeline;
pub mod queue;
pub mod retry;
pub mod stats;
pub mod transport;

pub use config::{ExporterConfig, OverflowPolicy, QueueConfig, RetryPolicy};
pub use endpoint::EndpointSet;
pub use errors::{ConfigurationError, DeliveryError, EncodingError, ExportError};
pub use exporter::MonitoringExporter;
pub use pdata::Signal;
