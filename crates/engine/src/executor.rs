// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command executor.
//!
//! `execute` is a total function: admission failures, vetting failures,
//! spawn errors, timeouts, and normal exits all come back as a
//! `CommandResult` mirroring the command's id. The concurrency gate is a
//! counting semaphore; callers waiting on a slot are shed when the
//! cancel token fires.

use std::collections::HashSet;
use std::process::Output;
use std::time::{Duration, Instant};

use mm_wire::{Command, CommandKind, CommandResult};
use serde::Serialize;
use sysinfo::System;
use tokio::process::Command as ProcessCommand;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::subprocess::{run_with_timeout, RunError};
use crate::vet_shell_command;

const EXIT_NOT_PERMITTED: i32 = -1;
const EXIT_SHED: i32 = -2;
const EXIT_UNSAFE: i32 = -3;
const EXIT_RUNTIME: i32 = -4;

const TRUNCATION_MARKER: &str = "\n...[output truncated]";

/// Default target for the `ping` kind when no argument is given.
const DEFAULT_PING_TARGET: &str = "8.8.8.8";

/// Number of echo requests a `ping` command sends.
const PING_PROBES: &str = "4";

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub allowed_kinds: HashSet<CommandKind>,
    pub max_concurrency: usize,
    pub default_timeout: Duration,
    pub max_output_size: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            allowed_kinds: CommandKind::all().into_iter().collect(),
            max_concurrency: 4,
            default_timeout: Duration::from_secs(60),
            max_output_size: 1024 * 1024,
        }
    }
}

/// Observable executor state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutorSnapshot {
    pub max_concurrency: usize,
    pub in_use: usize,
    pub allowed_kinds: Vec<String>,
}

pub struct Executor {
    allowed: HashSet<CommandKind>,
    gate: Semaphore,
    max_concurrency: usize,
    default_timeout: Duration,
    max_output_size: usize,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        let max_concurrency = config.max_concurrency.max(1);
        Self {
            allowed: config.allowed_kinds,
            gate: Semaphore::new(max_concurrency),
            max_concurrency,
            default_timeout: config.default_timeout,
            max_output_size: config.max_output_size,
        }
    }

    pub fn snapshot(&self) -> ExecutorSnapshot {
        let mut allowed_kinds: Vec<String> =
            self.allowed.iter().map(|k| k.as_str().to_string()).collect();
        allowed_kinds.sort();
        ExecutorSnapshot {
            max_concurrency: self.max_concurrency,
            in_use: self.max_concurrency - self.gate.available_permits(),
            allowed_kinds,
        }
    }

    /// Run one command to a result. Never fails; rejections and runtime
    /// errors are shaped into failed results.
    pub async fn execute(&self, cmd: Command, cancel: &CancellationToken) -> CommandResult {
        if !self.allowed.contains(&cmd.kind) {
            return CommandResult::rejected(&cmd.id, EXIT_NOT_PERMITTED, "command kind not permitted");
        }

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return CommandResult::rejected(&cmd.id, EXIT_SHED, "shed: slot timeout");
            }
            acquired = self.gate.acquire() => match acquired {
                Ok(permit) => permit,
                Err(_) => {
                    return CommandResult::rejected(&cmd.id, EXIT_SHED, "executor gate closed");
                }
            },
        };

        debug!(id = %cmd.id, kind = %cmd.kind, "executing command");
        let started = Instant::now();
        let mut result = match cmd.kind {
            CommandKind::Shell => self.run_shell(&cmd, cancel).await,
            CommandKind::Info => self.run_info(&cmd),
            CommandKind::Ping => self.run_ping(&cmd, cancel).await,
            CommandKind::Restart => CommandResult::finished(
                &cmd.id,
                0,
                "restart acknowledged; the agent will respawn".to_string(),
                String::new(),
                0,
            ),
        };
        result.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            id = %result.id,
            success = result.success,
            exit_code = result.exit_code,
            duration_ms = result.duration_ms,
            "command finished"
        );
        result
    }

    fn effective_timeout(&self, timeout_s: u64) -> Duration {
        if timeout_s == 0 {
            self.default_timeout
        } else {
            Duration::from_secs(timeout_s).min(self.default_timeout)
        }
    }

    async fn run_shell(&self, cmd: &Command, cancel: &CancellationToken) -> CommandResult {
        let raw = cmd.command.as_deref().unwrap_or("");
        let vetted = match vet_shell_command(raw) {
            Ok(vetted) => vetted,
            Err(rejection) => {
                return CommandResult::rejected(&cmd.id, EXIT_UNSAFE, rejection.to_string());
            }
        };

        let timeout = self.effective_timeout(cmd.timeout_s);
        let shell = host_shell(vetted);
        match run_with_timeout(shell, timeout, cancel, "shell command").await {
            Ok(output) => self.shape_process_result(&cmd.id, &output),
            Err(e) => runtime_failure(&cmd.id, &e),
        }
    }

    fn run_info(&self, cmd: &Command) -> CommandResult {
        let report = cmd.args.first().map(String::as_str).unwrap_or("system");
        let value = match report {
            "memory" => {
                let mut sys = System::new();
                sys.refresh_memory();
                serde_json::json!({
                    "report": "memory",
                    "total_bytes": sys.total_memory(),
                    "used_bytes": sys.used_memory(),
                    "total_swap_bytes": sys.total_swap(),
                    "used_swap_bytes": sys.used_swap(),
                })
            }
            "version" => serde_json::json!({
                "report": "version",
                "agent_version": env!("CARGO_PKG_VERSION"),
                "os": std::env::consts::OS,
                "architecture": std::env::consts::ARCH,
            }),
            _ => serde_json::json!({
                "report": "system",
                "os": std::env::consts::OS,
                "architecture": std::env::consts::ARCH,
                "cpu_count": std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
                "uptime_s": System::uptime(),
                "agent_version": env!("CARGO_PKG_VERSION"),
            }),
        };
        match serde_json::to_string_pretty(&value) {
            Ok(text) => CommandResult::finished(&cmd.id, 0, text, String::new(), 0),
            Err(e) => CommandResult::finished(
                &cmd.id,
                EXIT_RUNTIME,
                String::new(),
                format!("info serialization failed: {e}"),
                0,
            ),
        }
    }

    async fn run_ping(&self, cmd: &Command, cancel: &CancellationToken) -> CommandResult {
        let target = match cmd.args.first() {
            Some(arg) => {
                let trimmed = arg.trim();
                if trimmed.is_empty() {
                    return CommandResult::rejected(&cmd.id, EXIT_UNSAFE, "empty ping target");
                }
                trimmed.to_string()
            }
            None => DEFAULT_PING_TARGET.to_string(),
        };

        let timeout = self.effective_timeout(cmd.timeout_s);
        let mut probe = ProcessCommand::new("ping");
        if cfg!(windows) {
            probe.arg("-n").arg(PING_PROBES);
        } else {
            probe.arg("-c").arg(PING_PROBES);
        }
        probe.arg(&target);

        match run_with_timeout(probe, timeout, cancel, "ping").await {
            Ok(output) => self.shape_process_result(&cmd.id, &output),
            Err(e) => runtime_failure(&cmd.id, &e),
        }
    }

    fn shape_process_result(&self, id: &str, output: &Output) -> CommandResult {
        let mut combined = Vec::with_capacity(output.stdout.len() + output.stderr.len());
        combined.extend_from_slice(&output.stdout);
        combined.extend_from_slice(&output.stderr);
        let text = self.truncate_output(&combined);

        let exit_code = output.status.code().unwrap_or(EXIT_RUNTIME);
        let error = if output.status.success() {
            String::new()
        } else {
            format!("command exited with status {exit_code}")
        };
        CommandResult::finished(id, exit_code, text, error, 0)
    }

    fn truncate_output(&self, bytes: &[u8]) -> String {
        if bytes.len() <= self.max_output_size {
            return String::from_utf8_lossy(bytes).into_owned();
        }
        let mut text = String::from_utf8_lossy(&bytes[..self.max_output_size]).into_owned();
        text.push_str(TRUNCATION_MARKER);
        text
    }
}

fn runtime_failure(id: &str, error: &RunError) -> CommandResult {
    CommandResult::finished(id, EXIT_RUNTIME, String::new(), error.to_string(), 0)
}

fn host_shell(script: &str) -> ProcessCommand {
    if cfg!(windows) {
        let mut shell = ProcessCommand::new("cmd");
        shell.arg("/C").arg(script);
        shell
    } else {
        let mut shell = ProcessCommand::new("sh");
        shell.arg("-c").arg(script);
        shell
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
