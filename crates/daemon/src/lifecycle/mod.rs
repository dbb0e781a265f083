// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle: startup, the five activity loops, shutdown, restart.
//!
//! The supervisor owns the root cancel token and the shared status
//! block. `run` registers with the backend, flips to `Running`, spawns
//! the loops, and then waits for either the cancel (stop) or the
//! restart signal emitted by the command loop.

mod loops;

use std::sync::Arc;
use std::time::{Duration, Instant};

use mm_core::{epoch_ms, AgentState, AgentStatus, StatusSnapshot, SystemClock};
use mm_engine::{Executor, ExecutorConfig, ExecutorSnapshot};
use mm_probe::{Collector, SysinfoProbe};
use mm_transport::{
    CircuitBreaker, RequestTransport, RetryPolicy, StreamConfig, StreamTransport, SubmitError,
    SubmitPolicy, TransportError,
};
use mm_wire::Inventory;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use loops::LoopCtx;

/// How long loops get to drain after cancellation before being abandoned.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// How the supervisor's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Stopped,
    Restart,
}

/// Snapshot published to attached observers every status tick.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub agent: StatusSnapshot,
    pub executor: ExecutorSnapshot,
    pub stream_connected: bool,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("transport setup failed: {0}")]
    Transport(#[from] TransportError),

    #[error("registration failed: {0}")]
    Register(String),

    #[error("agent already started")]
    AlreadyStarted,

    #[error("activity loops did not drain within the shutdown grace")]
    ShutdownTimeout,
}

pub struct Supervisor {
    config: Arc<Config>,
    status: Arc<AgentStatus>,
    cancel: CancellationToken,
    reports: watch::Sender<StatusReport>,
    // Held so `subscribe` keeps working with no attached observers.
    _reports_rx: watch::Receiver<StatusReport>,
}

impl Supervisor {
    pub fn new(config: Config) -> Self {
        let status = Arc::new(AgentStatus::new(epoch_ms()));
        let initial = StatusReport {
            agent: status.snapshot(),
            executor: ExecutorSnapshot {
                max_concurrency: config.max_concurrency.max(1),
                in_use: 0,
                allowed_kinds: {
                    let mut kinds: Vec<String> =
                        config.allowed_kinds.iter().map(|k| k.as_str().to_string()).collect();
                    kinds.sort();
                    kinds
                },
            },
            stream_connected: false,
        };
        let (reports, reports_rx) = watch::channel(initial);
        Self {
            config: Arc::new(config),
            status,
            cancel: CancellationToken::new(),
            reports,
            _reports_rx: reports_rx,
        }
    }

    pub fn status(&self) -> Arc<AgentStatus> {
        Arc::clone(&self.status)
    }

    /// Observe the 5-second status publications.
    pub fn subscribe(&self) -> watch::Receiver<StatusReport> {
        self.reports.subscribe()
    }

    /// Request shutdown. Idempotent; fans the cancellation out to every
    /// loop and every in-flight operation.
    pub fn stop(&self) {
        if self.status.state() == AgentState::Running {
            self.status.set_state(AgentState::Stopping);
        }
        self.cancel.cancel();
    }

    /// Run the agent until stopped or a restart is requested.
    pub async fn run(&self) -> Result<Outcome, LifecycleError> {
        let result = self.run_inner().await;
        match &result {
            Ok(_) | Err(LifecycleError::ShutdownTimeout) => {
                self.status.set_state(AgentState::Stopped);
            }
            Err(_) => self.status.set_state(AgentState::Error),
        }
        result
    }

    async fn run_inner(&self) -> Result<Outcome, LifecycleError> {
        if self.cancel.is_cancelled() {
            return Ok(Outcome::Stopped);
        }
        if self.status.state() != AgentState::Starting {
            return Err(LifecycleError::AlreadyStarted);
        }
        let config = &self.config;
        info!(machine_id = %config.machine_id, backend = %config.base_url, "starting agent");

        let transport = Arc::new(RequestTransport::new(
            &config.base_url,
            &config.api_key,
            &config.machine_id,
            config.request_timeout,
        )?);
        let retry = RetryPolicy {
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            multiplier: config.backoff_multiplier,
            jitter: config.backoff_jitter,
        };
        let submit = Arc::new(SubmitPolicy::new(
            retry,
            CircuitBreaker::with_defaults(SystemClock),
            &config.machine_id,
        ));
        let collector = Arc::new(Collector::new(
            SysinfoProbe::new(config.request_timeout / 2),
            SystemClock,
            config.cache_ttl,
        ));
        let executor = Arc::new(Executor::new(ExecutorConfig {
            allowed_kinds: config.allowed_kinds.clone(),
            max_concurrency: config.max_concurrency,
            ..ExecutorConfig::default()
        }));

        // Open the stream; its task owns reconnection from here on.
        let stream_config = StreamConfig {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            machine_id: config.machine_id.clone(),
            reconnect_interval: config.reconnect_interval,
            ping_interval: config.ping_interval,
            read_idle_timeout: config.read_idle_timeout,
            write_timeout: config.write_timeout,
        };
        let (stream, commands_rx) = StreamTransport::spawn(
            stream_config,
            Arc::clone(&self.status),
            self.cancel.child_token(),
        );

        // Register with the backend; a probe failure is tolerated with an
        // empty report, a registration failure is fatal at startup.
        let inventory = match collector
            .collect_inventory(&config.machine_id, &self.cancel)
            .await
        {
            Ok(inventory) => inventory,
            Err(e) => {
                warn!(error = %e, "initial inventory collection failed, registering empty");
                Inventory::empty(&config.machine_id)
            }
        };
        let status = &self.status;
        let registered = submit
            .submit(&self.cancel, || status.add_retries(1), || {
                let transport = Arc::clone(&transport);
                let cancel = self.cancel.clone();
                let inventory = inventory.clone();
                async move { transport.register(&inventory, &cancel).await }
            })
            .await;
        match registered {
            Ok(()) => info!("registered with backend"),
            // a stop during startup is a clean exit, not a failure
            Err(SubmitError::Cancelled) => return Ok(Outcome::Stopped),
            Err(_) if self.cancel.is_cancelled() => return Ok(Outcome::Stopped),
            Err(e) => return Err(LifecycleError::Register(e.to_string())),
        }

        self.status.set_state(AgentState::Running);

        let ctx = LoopCtx {
            config: Arc::clone(&self.config),
            status: Arc::clone(&self.status),
            transport,
            submit,
            collector,
            executor,
            stream,
            cancel: self.cancel.clone(),
        };
        let (restart_tx, mut restart_rx) = mpsc::channel::<()>(1);
        let started = Instant::now();

        let mut tasks = JoinSet::new();
        tasks.spawn(loops::main_loop(ctx.clone(), restart_tx.clone()));
        tasks.spawn(loops::heartbeat_loop(ctx.clone()));
        tasks.spawn(loops::inventory_loop(ctx.clone()));
        tasks.spawn(loops::command_loop(commands_rx, ctx.clone(), restart_tx.clone()));
        tasks.spawn(loops::status_loop(ctx, self.reports.clone(), started));
        drop(restart_tx);

        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => Outcome::Stopped,
            signal = restart_rx.recv() => match signal {
                Some(()) => Outcome::Restart,
                None => Outcome::Stopped,
            },
        };
        self.stop();

        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        .is_ok();
        if !drained {
            warn!("abandoning undrained activity loops");
            tasks.abort_all();
            return Err(LifecycleError::ShutdownTimeout);
        }

        info!(outcome = ?outcome, "agent run finished");
        Ok(outcome)
    }
}

/// Re-execute the current binary with the same invocation. Best-effort:
/// the caller logs a spawn failure and proceeds with shutdown.
pub fn respawn() -> std::io::Result<()> {
    let exe = std::env::current_exe()?;
    let args: Vec<std::ffi::OsString> = std::env::args_os().skip(1).collect();
    std::process::Command::new(exe).args(args).spawn().map(drop)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
