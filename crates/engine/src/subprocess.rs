// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use std::process::Output;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("{description} timed out after {}s", .timeout.as_secs())]
    Timeout { description: String, timeout: Duration },

    #[error("{description} cancelled")]
    Cancelled { description: String },

    #[error("{description} failed: {source}")]
    Io {
        description: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run a subprocess with a timeout, honoring the cancel token.
///
/// The child is configured with `kill_on_drop` so that both timeout
/// expiry and cancellation reap the process rather than leaking it.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    cancel: &CancellationToken,
    description: &str,
) -> Result<Output, RunError> {
    cmd.kill_on_drop(true);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RunError::Cancelled { description: description.to_string() }),
        outcome = tokio::time::timeout(timeout, cmd.output()) => match outcome {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(io_err)) => {
                Err(RunError::Io { description: description.to_string(), source: io_err })
            }
            Err(_elapsed) => {
                Err(RunError::Timeout { description: description.to_string(), timeout })
            }
        },
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
