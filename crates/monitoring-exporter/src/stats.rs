// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery counters, one set per signal.

use crate::pdata::Signal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct SignalStats {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    retried: AtomicU64,
    dropped: AtomicU64,
    overflowed: AtomicU64,
    bytes_delivered: AtomicU64,
}

/// Point-in-time copy of [`SignalStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SignalStatsSnapshot {
    pub enqueued: u64,
    pub delivered: u64,
    pub retried: u64,
    /// Payloads discarded after admission: retry budget exhausted, permanent failure,
    /// encoding failure, eviction or shutdown.
    pub dropped: u64,
    /// Payloads refused at admission because the queue was full.
    pub overflowed: u64,
    pub bytes_delivered: u64,
}

impl SignalStats {
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self, bytes: usize) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.bytes_delivered
            .fetch_add(u64::try_from(bytes).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    pub fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_overflowed(&self) {
        self.overflowed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> SignalStatsSnapshot {
        SignalStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            overflowed: self.overflowed.load(Ordering::Relaxed),
            bytes_delivered: self.bytes_delivered.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
pub struct DeliveryStats {
    traces: Arc<SignalStats>,
    metrics: Arc<SignalStats>,
    logs: Arc<SignalStats>,
}

impl DeliveryStats {
    #[must_use]
    pub fn signal(&self, signal: Signal) -> &Arc<SignalStats> {
        match signal {
            Signal::Traces => &self.traces,
            Signal::Metrics => &self.metrics,
            Signal::Logs => &self.logs,
        }
    }

    #[must_use]
    pub fn snapshot(&self, signal: Signal) -> SignalStatsSnapshot {
        self.signal(signal).snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_per_signal() {
        let stats = DeliveryStats::default();
        stats.signal(Signal::Logs).record_enqueued();
        stats.signal(Signal::Logs).record_delivered(128);
        stats.signal(Signal::Logs).record_retried();
        stats.signal(Signal::Metrics).record_dropped(2);
        stats.signal(Signal::Metrics).record_overflowed();

        assert_eq!(
            stats.snapshot(Signal::Logs),
            SignalStatsSnapshot {
                enqueued: 1,
                delivered: 1,
                retried: 1,
                bytes_delivered: 128,
                ..Default::default()
            }
        );
        assert_eq!(stats.snapshot(Signal::Metrics).dropped, 2);
        assert_eq!(stats.snapshot(Signal::Metrics).overflowed, 1);
        assert_eq!(stats.snapshot(Signal::Traces), SignalStatsSnapshot::default());
    }
}
