// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker for outbound submissions.
//!
//! Closed until `failure_threshold` consecutive failures, then open:
//! calls are refused without touching the network until `reset_timeout`
//! has elapsed, after which a bounded number of half-open probes decide
//! whether to close again.

use std::time::{Duration, Instant};

use mm_core::Clock;
use parking_lot::Mutex;
use thiserror::Error;

/// Breaker position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Refusal returned while the breaker is open.
#[derive(Debug, Error)]
#[error("circuit breaker open")]
pub struct BreakerOpen;

pub struct CircuitBreaker<C: Clock> {
    clock: C,
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_calls: u32,
    inner: Mutex<Inner>,
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_calls: u32,
}

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HALF_OPEN_MAX_CALLS: u32 = 3;

impl<C: Clock> CircuitBreaker<C> {
    pub fn new(
        clock: C,
        failure_threshold: u32,
        reset_timeout: Duration,
        half_open_max_calls: u32,
    ) -> Self {
        Self {
            clock,
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            half_open_max_calls: half_open_max_calls.max(1),
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                half_open_calls: 0,
            }),
        }
    }

    pub fn with_defaults(clock: C) -> Self {
        Self::new(
            clock,
            DEFAULT_FAILURE_THRESHOLD,
            DEFAULT_RESET_TIMEOUT,
            DEFAULT_HALF_OPEN_MAX_CALLS,
        )
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Gate a call. `Ok` admits it; the caller must report the outcome
    /// via [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn admit(&self) -> Result<(), BreakerOpen> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let expired = inner
                    .opened_at
                    .map(|at| self.clock.now().duration_since(at) >= self.reset_timeout)
                    .unwrap_or(true);
                if expired {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_calls = 1;
                    Ok(())
                } else {
                    Err(BreakerOpen)
                }
            }
            BreakerState::HalfOpen => {
                if inner.half_open_calls < self.half_open_max_calls {
                    inner.half_open_calls += 1;
                    Ok(())
                } else {
                    Err(BreakerOpen)
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.half_open_calls = 0;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(self.clock.now());
                }
            }
            BreakerState::HalfOpen | BreakerState::Open => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(self.clock.now());
                inner.half_open_calls = 0;
            }
        }
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
