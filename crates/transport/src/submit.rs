// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submission policy: circuit breaker wrapped around retry.
//!
//! One submission either succeeds (breaker records success), exhausts
//! its retries (breaker records one failure), or is refused outright
//! while the breaker is open — in which case the network is never
//! touched.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use mm_core::Clock;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{retry_with_policy, BreakerOpen, BreakerState, CircuitBreaker, RetryError, RetryPolicy};

#[derive(Debug, Error)]
pub enum SubmitError<E: std::error::Error> {
    #[error(transparent)]
    BreakerOpen(#[from] BreakerOpen),

    #[error("cancelled while submitting")]
    Cancelled,

    #[error("{attempts} attempts failed, last error: {last}")]
    Exhausted { attempts: u32, last: E },
}

/// Retry + breaker policy shared by the supervisor's submission loops.
pub struct SubmitPolicy<C: Clock> {
    retry: RetryPolicy,
    breaker: CircuitBreaker<C>,
    seed_base: u64,
    sequence: AtomicU64,
}

impl<C: Clock> SubmitPolicy<C> {
    /// `seed_key` (typically the machine id) anchors the jitter sequence
    /// so distinct machines back off on different schedules.
    pub fn new(retry: RetryPolicy, breaker: CircuitBreaker<C>, seed_key: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        seed_key.hash(&mut hasher);
        Self { retry, breaker, seed_base: hasher.finish(), sequence: AtomicU64::new(0) }
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    pub async fn submit<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        on_retry: impl FnMut(),
        op: F,
    ) -> Result<T, SubmitError<E>>
    where
        E: std::error::Error,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.breaker.admit()?;
        let seed = self
            .seed_base
            .wrapping_add(self.sequence.fetch_add(1, Ordering::Relaxed));
        match retry_with_policy(&self.retry, cancel, seed, on_retry, op).await {
            Ok(value) => {
                self.breaker.record_success();
                Ok(value)
            }
            Err(RetryError::Cancelled) => Err(SubmitError::Cancelled),
            Err(RetryError::Exhausted { attempts, last }) => {
                self.breaker.record_failure();
                Err(SubmitError::Exhausted { attempts, last })
            }
        }
    }
}

#[cfg(test)]
#[path = "submit_tests.rs"]
mod tests;
