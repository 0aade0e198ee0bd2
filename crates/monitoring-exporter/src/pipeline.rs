// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-signal delivery pipeline: one queue drained by a fixed pool of workers.
//!
//! Each worker pops a ready item, performs one HTTP attempt and settles the outcome:
//!
//! - success: the item is released and counted as delivered
//! - retryable failure within the retry budget: the item is rescheduled with backoff
//! - permanent failure or exhausted budget: the item is released and counted as dropped

use crate::config::{QueueConfig, RetryPolicy};
use crate::encoder::EncodedPayload;
use crate::errors::{DeliveryError, ExportError};
use crate::pdata::Signal;
use crate::queue::{Admission, DeliveryItem, DeliveryQueue};
use crate::retry::{GiveUpReason, RetryDecision};
use crate::stats::SignalStats;
use crate::transport::Transport;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_ENCODING};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn, Instrument};

/// Terminal or intermediate state reached by an item after one attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disposition {
    Delivered,
    Retrying { attempt: u32, delay: Duration },
    Dropped(DropReason),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    Permanent(u16),
    RetriesExhausted(GiveUpReason),
    Cancelled,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Permanent(status) => write!(f, "permanent failure with status {status}"),
            DropReason::RetriesExhausted(reason) => write!(f, "{reason}"),
            DropReason::Cancelled => write!(f, "aborted by shutdown"),
        }
    }
}

/// Settings shared by every worker of one pipeline.
#[derive(Debug)]
pub struct PipelineSettings {
    pub signal: Signal,
    pub url: String,
    pub retry: RetryPolicy,
    pub retry_client_errors: bool,
}

struct Worker {
    id: usize,
    settings: Arc<PipelineSettings>,
    queue: Arc<DeliveryQueue>,
    transport: Arc<dyn Transport>,
    stats: Arc<SignalStats>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        debug!(
            "{} | Worker {} started",
            self.settings.signal.log_prefix(),
            self.id
        );
        while let Some(item) = self.queue.pop(&self.cancel).await {
            self.attempt(item).await;
        }
        debug!(
            "{} | Worker {} stopped",
            self.settings.signal.log_prefix(),
            self.id
        );
    }

    async fn attempt(&self, mut item: DeliveryItem) -> Disposition {
        item.attempts += 1;
        let bytes = item.payload.len();
        let extra_headers = extra_headers(&item.payload);

        let result = tokio::select! {
            result = self.transport.deliver(&self.settings.url, item.payload.body.clone(), &extra_headers) => result,
            () = self.cancel.cancelled() => {
                warn!(
                    signal = %self.settings.signal,
                    url = %self.settings.url,
                    attempt = item.attempts,
                    bytes,
                    outcome = "drop",
                    "{} | Delivery aborted by shutdown",
                    self.settings.signal.log_prefix()
                );
                self.stats.record_dropped(1);
                self.queue.complete(item);
                return Disposition::Dropped(DropReason::Cancelled);
            }
        };

        let disposition = settle(&self.settings, &item, result.as_ref().err());
        match &disposition {
            Disposition::Delivered => {
                debug!(
                    signal = %self.settings.signal,
                    url = %self.settings.url,
                    attempt = item.attempts,
                    bytes,
                    outcome = "success",
                    "{} | Delivered {} items",
                    self.settings.signal.log_prefix(),
                    item.payload.item_count
                );
                self.stats.record_delivered(bytes);
                self.queue.complete(item);
            }
            Disposition::Retrying { delay, .. } => {
                warn!(
                    signal = %self.settings.signal,
                    url = %self.settings.url,
                    attempt = item.attempts,
                    bytes,
                    outcome = "retry",
                    "{} | Delivery failed, retrying in {} ms: {}",
                    self.settings.signal.log_prefix(),
                    delay.as_millis(),
                    describe(result.as_ref().err())
                );
                self.stats.record_retried();
                self.queue.reschedule(item, *delay);
            }
            Disposition::Dropped(reason) => {
                error!(
                    signal = %self.settings.signal,
                    url = %self.settings.url,
                    attempt = item.attempts,
                    bytes,
                    outcome = "drop",
                    "{} | Dropping {} items, {}: {}",
                    self.settings.signal.log_prefix(),
                    item.payload.item_count,
                    reason,
                    describe(result.as_ref().err())
                );
                self.stats.record_dropped(1);
                self.queue.complete(item);
            }
        }
        disposition
    }
}

/// Maps the outcome of an attempt to the item's next state. `item.attempts` already counts
/// the attempt that produced `error`.
pub fn settle(
    settings: &PipelineSettings,
    item: &DeliveryItem,
    error: Option<&DeliveryError>,
) -> Disposition {
    let Some(error) = error else {
        return Disposition::Delivered;
    };
    if !error.is_retryable(settings.retry_client_errors) {
        let status = match error {
            DeliveryError::HttpStatus { status, .. } => *status,
            DeliveryError::Transport { .. } => 0,
        };
        return Disposition::Dropped(DropReason::Permanent(status));
    }
    match settings
        .retry
        .next_retry(item.attempts, item.created_at.elapsed())
    {
        RetryDecision::RetryAfter(delay) => Disposition::Retrying {
            attempt: item.attempts,
            delay,
        },
        RetryDecision::GiveUp(reason) => Disposition::Dropped(DropReason::RetriesExhausted(reason)),
    }
}

fn extra_headers(payload: &EncodedPayload) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if payload.compressed {
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("zstd"));
    }
    headers
}

fn describe(error: Option<&DeliveryError>) -> String {
    error.map(ToString::to_string).unwrap_or_default()
}

/// A queue plus the workers draining it.
pub struct SignalPipeline {
    settings: Arc<PipelineSettings>,
    queue: Arc<DeliveryQueue>,
    stats: Arc<SignalStats>,
    cancel: CancellationToken,
    workers: TokioMutex<JoinSet<()>>,
}

impl SignalPipeline {
    /// Spawns `queue.num_workers` workers on the current Tokio runtime.
    pub fn start(
        settings: PipelineSettings,
        queue_config: &QueueConfig,
        transport: Arc<dyn Transport>,
        stats: Arc<SignalStats>,
        cancel: CancellationToken,
    ) -> Self {
        let settings = Arc::new(settings);
        let queue = Arc::new(DeliveryQueue::new(
            settings.signal,
            queue_config.capacity,
            queue_config.overflow_policy,
        ));

        let mut workers = JoinSet::new();
        for id in 0..queue_config.num_workers {
            let worker = Worker {
                id,
                settings: Arc::clone(&settings),
                queue: Arc::clone(&queue),
                transport: Arc::clone(&transport),
                stats: Arc::clone(&stats),
                cancel: cancel.clone(),
            };
            // workers log under the span that started the pipeline
            workers.spawn(worker.run().in_current_span());
        }

        debug!(
            "{} | Pipeline started with {} workers, capacity {}",
            settings.signal.log_prefix(),
            queue_config.num_workers,
            queue_config.capacity
        );

        Self {
            settings,
            queue,
            stats,
            cancel,
            workers: TokioMutex::new(workers),
        }
    }

    /// Hands a payload to the queue. Returns once it is admitted; delivery happens later.
    pub async fn enqueue(&self, payload: EncodedPayload) -> Result<(), ExportError> {
        let item_count = payload.item_count;
        match self.queue.push(payload, &self.cancel).await {
            Ok(Admission::Accepted) => {
                self.stats.record_enqueued();
                Ok(())
            }
            Ok(Admission::Evicted(oldest)) => {
                warn!(
                    signal = %self.settings.signal,
                    outcome = "drop",
                    "{} | Queue full, evicted oldest batch of {} items after {} attempts",
                    self.settings.signal.log_prefix(),
                    oldest.payload.item_count,
                    oldest.attempts
                );
                self.stats.record_enqueued();
                self.stats.record_dropped(1);
                Ok(())
            }
            Err(e) => {
                if matches!(e, ExportError::QueueOverflow { .. }) {
                    self.stats.record_overflowed();
                }
                warn!(
                    signal = %self.settings.signal,
                    outcome = "drop",
                    "{} | Rejected batch of {} items: {}",
                    self.settings.signal.log_prefix(),
                    item_count,
                    e
                );
                Err(e)
            }
        }
    }

    /// Stops admission. Queued items are still delivered.
    pub fn close(&self) {
        self.queue.close();
    }

    /// Stops admission, lets workers drain the queue for up to `grace`, then aborts whatever
    /// is left. Items still queued at that point are counted as dropped.
    pub async fn shutdown(&self, grace: Duration) {
        self.close();
        let mut workers = self.workers.lock().await;

        let deadline = Instant::now() + grace;
        let drained = tokio::time::timeout_at(deadline, async {
            while workers.join_next().await.is_some() {}
        })
        .await
        .is_ok();

        if !drained {
            warn!(
                "{} | Grace period elapsed with {} queued and {} in flight, aborting",
                self.settings.signal.log_prefix(),
                self.queue.len(),
                self.queue.in_flight()
            );
            self.cancel.cancel();
            while workers.join_next().await.is_some() {}
        }

        let leftover = self.queue.drain();
        if !leftover.is_empty() {
            self.stats
                .record_dropped(u64::try_from(leftover.len()).unwrap_or(u64::MAX));
            error!(
                signal = %self.settings.signal,
                outcome = "drop",
                "{} | Discarded {} queued batches at shutdown",
                self.settings.signal.log_prefix(),
                leftover.len()
            );
        }
        debug!("{} | Pipeline stopped", self.settings.signal.log_prefix());
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.settings.url
    }

    #[must_use]
    pub fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }
}
