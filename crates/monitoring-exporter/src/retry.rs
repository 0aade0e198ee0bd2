// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Exponential backoff schedule.
//!
//! After the n-th failed attempt the next one is scheduled `initial * multiplier^(n-1)` later,
//! capped at `max_backoff`, then spread by `± randomization_factor`.

use crate::config::RetryPolicy;
use std::fmt;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GiveUpReason {
    MaxAttempts(u32),
    MaxElapsedTime(Duration),
}

impl fmt::Display for GiveUpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GiveUpReason::MaxAttempts(attempts) => write!(f, "retry budget of {attempts} attempts exhausted"),
            GiveUpReason::MaxElapsedTime(limit) => {
                write!(f, "retry window of {} ms exhausted", limit.as_millis())
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp(GiveUpReason),
}

impl RetryPolicy {
    /// Un-jittered delay after `failures` failed attempts (1-based).
    #[must_use]
    pub fn base_delay(&self, failures: u32) -> Duration {
        if failures == 0 || self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(failures - 1).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_backoff.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_backoff)
    }

    /// Delay after `failures` failed attempts, spread uniformly within
    /// `[d * (1 - randomization_factor), d * (1 + randomization_factor)]`.
    #[must_use]
    pub fn jittered_delay(&self, failures: u32) -> Duration {
        let base = self.base_delay(failures);
        if self.randomization_factor <= 0.0 || base.is_zero() {
            return base;
        }
        let spread = self.randomization_factor * (2.0 * fastrand::f64() - 1.0);
        Duration::try_from_secs_f64(base.as_secs_f64() * (1.0 + spread)).unwrap_or(base)
    }

    /// Decides what happens after the `attempts`-th attempt failed with a retryable error,
    /// `elapsed` after the first one.
    #[must_use]
    pub fn next_retry(&self, attempts: u32, elapsed: Duration) -> RetryDecision {
        if let Some(max_attempts) = self.max_attempts {
            if attempts >= max_attempts {
                return RetryDecision::GiveUp(GiveUpReason::MaxAttempts(max_attempts));
            }
        }
        let delay = self.jittered_delay(attempts);
        if let Some(max_elapsed) = self.max_elapsed_time {
            if elapsed + delay > max_elapsed {
                return RetryDecision::GiveUp(GiveUpReason::MaxElapsedTime(max_elapsed));
            }
        }
        RetryDecision::RetryAfter(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(initial_ms: u64, multiplier: f64, max_ms: u64) -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_millis(initial_ms),
            multiplier,
            max_backoff: Duration::from_millis(max_ms),
            randomization_factor: 0.0,
            max_attempts: None,
            max_elapsed_time: None,
        }
    }

    #[test]
    fn test_exponential_schedule_is_capped() {
        let policy = policy(1000, 2.0, 10_000);
        let delays: Vec<u128> = (1..=6).map(|n| policy.base_delay(n).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10_000, 10_000]);
    }

    #[test]
    fn test_huge_failure_count_does_not_overflow() {
        let policy = policy(1000, 2.0, 10_000);
        assert_eq!(policy.base_delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_within_window() {
        let policy = RetryPolicy {
            randomization_factor: 0.5,
            ..policy(1000, 2.0, 10_000)
        };
        for _ in 0..200 {
            let delay = policy.jittered_delay(2);
            assert!(delay >= Duration::from_millis(1000), "{delay:?} below window");
            assert!(delay <= Duration::from_millis(3000), "{delay:?} above window");
        }
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: Some(3),
            ..policy(1000, 2.0, 10_000)
        };
        assert_eq!(
            policy.next_retry(1, Duration::ZERO),
            RetryDecision::RetryAfter(Duration::from_secs(1))
        );
        assert_eq!(
            policy.next_retry(2, Duration::from_secs(1)),
            RetryDecision::RetryAfter(Duration::from_secs(2))
        );
        assert_eq!(
            policy.next_retry(3, Duration::from_secs(3)),
            RetryDecision::GiveUp(GiveUpReason::MaxAttempts(3))
        );
    }

    #[test]
    fn test_gives_up_when_next_attempt_would_exceed_elapsed_budget() {
        let policy = RetryPolicy {
            max_elapsed_time: Some(Duration::from_secs(5)),
            ..policy(1000, 2.0, 10_000)
        };
        assert_eq!(
            policy.next_retry(2, Duration::from_secs(1)),
            RetryDecision::RetryAfter(Duration::from_secs(2))
        );
        assert_eq!(
            policy.next_retry(3, Duration::from_secs(3)),
            RetryDecision::GiveUp(GiveUpReason::MaxElapsedTime(Duration::from_secs(5)))
        );
    }

    #[test]
    fn test_give_up_reason_display() {
        assert_eq!(
            GiveUpReason::MaxAttempts(4).to_string(),
            "retry budget of 4 attempts exhausted"
        );
    }
}
