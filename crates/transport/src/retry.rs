// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential backoff retry with deterministic jitter.
//!
//! Jitter is derived from a caller-provided seed rather than an RNG, so
//! backoff sequences are reproducible under test while still spreading
//! real deployments apart (callers seed from the machine id).

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Backoff parameters for one submission.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Base backoff before attempt `k + 1`, capped at `max_backoff`.
    pub fn backoff_for(&self, k: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(k as i32);
        let capped = base.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Backoff with ±10% jitter taken from `seed`.
    pub fn backoff_with_jitter(&self, k: u32, seed: u64) -> Duration {
        let base = self.backoff_for(k);
        if !self.jitter {
            return base;
        }
        // 20% window centered on the base delay
        let window = base.as_millis() as u64 / 5;
        if window == 0 {
            return base;
        }
        let offset = (seed % window) as i64 - (window / 2) as i64;
        let adjusted = (base.as_millis() as i64 + offset).max(1) as u64;
        Duration::from_millis(adjusted)
    }
}

#[derive(Debug, Error)]
pub enum RetryError<E: std::error::Error> {
    #[error("cancelled while retrying")]
    Cancelled,

    #[error("{attempts} attempts failed, last error: {last}")]
    Exhausted { attempts: u32, last: E },
}

/// Run `op` until it succeeds, retries are exhausted, or `cancel` fires.
///
/// `on_retry` is invoked once per re-attempt, before its backoff sleep.
pub async fn retry_with_policy<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    jitter_seed: u64,
    mut on_retry: impl FnMut(),
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: std::error::Error,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt > policy.max_retries {
                    return Err(RetryError::Exhausted { attempts: attempt, last: e });
                }
                on_retry();
                let backoff =
                    policy.backoff_with_jitter(attempt - 1, jitter_seed.wrapping_add(attempt.into()));
                tokio::select! {
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
