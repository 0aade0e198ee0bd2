// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded per-signal delivery queue.
//!
//! Items are kept ordered by `(next attempt time, admission sequence)`. A retried item goes
//! back in with its original sequence number, so among items ready at the same time the
//! earliest admitted one leaves first.
//!
//! ```text
//!   push ──> Queued ──pop──> InFlight ──complete──> (gone)
//!              ^                 │
//!              └──reschedule─────┘
//! ```
//!
//! Capacity counts queued and in-flight items, so a reschedule always fits.

use crate::config::OverflowPolicy;
use crate::encoder::EncodedPayload;
use crate::errors::ExportError;
use crate::pdata::Signal;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One encoded batch owned by the queue until it is delivered or dropped.
#[derive(Debug)]
pub struct DeliveryItem {
    /// Admission sequence number, unique per queue.
    pub id: u64,
    pub payload: EncodedPayload,
    pub created_at: Instant,
    /// Attempts performed so far.
    pub attempts: u32,
    pub next_attempt_at: Instant,
}

/// Result of a successful admission.
#[derive(Debug)]
pub enum Admission {
    Accepted,
    /// Accepted after evicting the oldest queued item.
    Evicted(DeliveryItem),
}

enum TryAdmit {
    Admitted(Admission),
    Full(EncodedPayload),
}

#[derive(Debug, Default)]
struct QueueState {
    queued: BTreeMap<(Instant, u64), DeliveryItem>,
    in_flight: usize,
    closed: bool,
    next_id: u64,
}

impl QueueState {
    fn owned(&self) -> usize {
        self.queued.len() + self.in_flight
    }

    fn insert(&mut self, item: DeliveryItem) {
        self.queued.insert((item.next_attempt_at, item.id), item);
    }

    fn evict_oldest(&mut self) -> Option<DeliveryItem> {
        let key = self
            .queued
            .iter()
            .min_by_key(|(_, item)| item.id)
            .map(|(key, _)| *key)?;
        self.queued.remove(&key)
    }
}

#[derive(Debug)]
pub struct DeliveryQueue {
    signal: Signal,
    capacity: usize,
    overflow_policy: OverflowPolicy,
    state: Mutex<QueueState>,
    changed: Notify,
}

impl DeliveryQueue {
    #[must_use]
    pub fn new(signal: Signal, capacity: usize, overflow_policy: OverflowPolicy) -> Self {
        Self {
            signal,
            capacity,
            overflow_policy,
            state: Mutex::new(QueueState::default()),
            changed: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // state is only mutated in short critical sections that cannot panic halfway
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Admits a payload, applying the overflow policy when the queue is full.
    ///
    /// With [`OverflowPolicy::Block`] this waits for room, giving up when `cancel` fires.
    pub async fn push(
        &self,
        payload: EncodedPayload,
        cancel: &CancellationToken,
    ) -> Result<Admission, ExportError> {
        let mut payload = payload;
        loop {
            let changed = self.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            match self.try_admit(payload)? {
                TryAdmit::Admitted(admission) => {
                    self.changed.notify_waiters();
                    return Ok(admission);
                }
                TryAdmit::Full(returned) => payload = returned,
            }

            tokio::select! {
                () = &mut changed => {}
                () = cancel.cancelled() => return Err(ExportError::ShuttingDown),
            }
        }
    }

    fn try_admit(&self, payload: EncodedPayload) -> Result<TryAdmit, ExportError> {
        let mut state = self.lock();
        if state.closed {
            return Err(ExportError::ShuttingDown);
        }

        let evicted = if state.owned() < self.capacity {
            None
        } else {
            match self.overflow_policy {
                OverflowPolicy::Block => return Ok(TryAdmit::Full(payload)),
                OverflowPolicy::DropNewest => return Err(self.overflow()),
                // with everything in flight there is nothing to evict
                OverflowPolicy::DropOldest => {
                    Some(state.evict_oldest().ok_or_else(|| self.overflow())?)
                }
            }
        };

        let now = Instant::now();
        let id = state.next_id;
        state.next_id += 1;
        state.insert(DeliveryItem {
            id,
            payload,
            created_at: now,
            attempts: 0,
            next_attempt_at: now,
        });

        Ok(TryAdmit::Admitted(match evicted {
            Some(item) => Admission::Evicted(item),
            None => Admission::Accepted,
        }))
    }

    /// Takes the next item whose attempt time has come, waiting as needed.
    ///
    /// Returns `None` once `cancel` fires, or once the queue is closed and nothing is queued
    /// or in flight anymore.
    pub async fn pop(&self, cancel: &CancellationToken) -> Option<DeliveryItem> {
        loop {
            let changed = self.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            let wake_at = {
                let mut state = self.lock();
                if cancel.is_cancelled() {
                    return None;
                }
                match state.queued.first_key_value().map(|(key, _)| *key) {
                    Some(key) if key.0 <= Instant::now() => {
                        if let Some(item) = state.queued.remove(&key) {
                            state.in_flight += 1;
                            return Some(item);
                        }
                        continue;
                    }
                    Some((ready_at, _)) => Some(ready_at),
                    None if state.closed && state.in_flight == 0 => return None,
                    None => None,
                }
            };

            match wake_at {
                Some(ready_at) => tokio::select! {
                    () = &mut changed => {}
                    () = tokio::time::sleep_until(ready_at) => {}
                    () = cancel.cancelled() => return None,
                },
                None => tokio::select! {
                    () = &mut changed => {}
                    () = cancel.cancelled() => return None,
                },
            }
        }
    }

    /// Releases an in-flight item for good: delivered or dropped.
    pub fn complete(&self, item: DeliveryItem) {
        drop(item);
        {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.changed.notify_waiters();
    }

    /// Puts an in-flight item back, due `delay` from now.
    pub fn reschedule(&self, mut item: DeliveryItem, delay: Duration) {
        item.next_attempt_at = Instant::now() + delay;
        {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.insert(item);
        }
        self.changed.notify_waiters();
    }

    /// Stops admission. Queued items are still handed out.
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_waiters();
    }

    /// Removes every queued item.
    pub fn drain(&self) -> Vec<DeliveryItem> {
        let drained = std::mem::take(&mut self.lock().queued);
        self.changed.notify_waiters();
        drained.into_values().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().queued.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    #[must_use]
    pub fn signal(&self) -> Signal {
        self.signal
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn overflow(&self) -> ExportError {
        ExportError::QueueOverflow {
            signal: self.signal,
            capacity: self.capacity,
        }
    }
}
