// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logging initialization for the agent binary.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Map the config-file level names onto tracing's directives.
pub fn normalize_level(level: &str) -> &str {
    match level {
        "warning" => "warn",
        other => other,
    }
}

/// Initialize the global subscriber. When a log file is configured the
/// returned guard must be held for the life of the process so buffered
/// lines are flushed on exit.
pub fn init(level: &str, file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_new(normalize_level(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "mmd.log".to_string());
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
            None
        }
    }
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
