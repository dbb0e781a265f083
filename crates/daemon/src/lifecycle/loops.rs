// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The five activity loops the supervisor runs.
//!
//! Every loop observes the shared cancel token at each suspension point
//! and follows the same failure policy: log, bump the error counter,
//! keep looping. Nothing here stops a sibling loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mm_core::{epoch_ms, AgentStatus, SystemClock};
use mm_engine::Executor;
use mm_probe::{Collector, SysinfoProbe};
use mm_transport::{RequestTransport, StreamHandle, SubmitPolicy};
use mm_wire::{Command, CommandKind, CommandResult, HeartbeatData};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::env::AGENT_VERSION;

use super::StatusReport;

/// Liveness probe cadence for the main loop.
pub(crate) const LIVENESS_INTERVAL: Duration = Duration::from_secs(60);

/// Deadline for the liveness ping against the backend.
pub(crate) const PING_DEADLINE: Duration = Duration::from_secs(5);

/// Cadence of the status publisher.
pub(crate) const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Everything a loop needs, cheaply cloneable.
#[derive(Clone)]
pub(crate) struct LoopCtx {
    pub config: Arc<Config>,
    pub status: Arc<AgentStatus>,
    pub transport: Arc<RequestTransport>,
    pub submit: Arc<SubmitPolicy<SystemClock>>,
    pub collector: Arc<Collector<SysinfoProbe, SystemClock>>,
    pub executor: Arc<Executor>,
    pub stream: StreamHandle,
    pub cancel: CancellationToken,
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Main loop: liveness probing and reconnection watchdog. When the
/// stream is down it also pulls queued commands over the request
/// transport so they are not stranded.
pub(crate) async fn main_loop(ctx: LoopCtx, restart_tx: mpsc::Sender<()>) {
    let mut probe = ticker(LIVENESS_INTERVAL);
    probe.tick().await; // skip the immediate tick; the first probe runs one interval in

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = probe.tick() => {}
        }

        if !ctx.stream.is_connected() {
            warn!("stream disconnected, nudging reconnect");
            ctx.stream.nudge_reconnect();
            match ctx.transport.fetch_pending_commands(&ctx.cancel).await {
                Ok(commands) if !commands.is_empty() => {
                    info!(count = commands.len(), "fetched pending commands while stream is down");
                    for command in commands {
                        handle_command(&ctx, &restart_tx, command).await;
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "pending command fetch failed"),
            }
        }

        match ctx.transport.ping(PING_DEADLINE, &ctx.cancel).await {
            Ok(()) => debug!("backend ping ok"),
            Err(e) => {
                warn!(error = %e, "backend ping failed");
                ctx.status.record_error();
            }
        }
    }
    debug!("main loop drained");
}

/// Heartbeat loop: health sample (cached is fine) + submission with
/// retry and the circuit breaker.
pub(crate) async fn heartbeat_loop(ctx: LoopCtx) {
    let mut beat = ticker(ctx.config.heartbeat_interval);

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = beat.tick() => {}
        }

        match ctx.collector.collect_health(&ctx.cancel).await {
            Ok(sample) => ctx.status.set_health(sample),
            Err(e) => {
                warn!(error = %e, "health collection failed");
                ctx.status.record_error();
                continue;
            }
        }

        let heartbeat = HeartbeatData::from_status(
            &ctx.config.machine_id,
            AGENT_VERSION,
            &ctx.status.snapshot(),
        );
        let outcome = ctx
            .submit
            .submit(&ctx.cancel, || ctx.status.add_retries(1), || {
                let transport = Arc::clone(&ctx.transport);
                let cancel = ctx.cancel.clone();
                let heartbeat = heartbeat.clone();
                async move { transport.send_heartbeat(&heartbeat, &cancel).await }
            })
            .await;
        match outcome {
            Ok(()) => ctx.status.record_heartbeat_ok(epoch_ms()),
            Err(e) => {
                warn!(error = %e, "heartbeat submission failed");
                ctx.status.record_error();
            }
        }
    }
    debug!("heartbeat loop drained");
}

/// Inventory loop: the interval's immediate first tick doubles as the
/// initial submission.
pub(crate) async fn inventory_loop(ctx: LoopCtx) {
    let mut cycle = ticker(ctx.config.inventory_interval);

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = cycle.tick() => {}
        }

        let inventory = match ctx
            .collector
            .collect_inventory(&ctx.config.machine_id, &ctx.cancel)
            .await
        {
            Ok(inventory) => inventory,
            Err(e) => {
                warn!(error = %e, "inventory collection failed");
                ctx.status.record_error();
                continue;
            }
        };

        let outcome = ctx
            .submit
            .submit(&ctx.cancel, || ctx.status.add_retries(1), || {
                let transport = Arc::clone(&ctx.transport);
                let cancel = ctx.cancel.clone();
                let inventory = inventory.clone();
                async move { transport.send_inventory(&inventory, &cancel).await }
            })
            .await;
        match outcome {
            Ok(()) => ctx.status.record_inventory_ok(epoch_ms()),
            Err(e) => {
                warn!(error = %e, "inventory submission failed");
                ctx.status.record_error();
            }
        }
    }
    debug!("inventory loop drained");
}

/// Command loop: drain the stream's inbound queue through the executor.
pub(crate) async fn command_loop(
    mut commands: mpsc::Receiver<Command>,
    ctx: LoopCtx,
    restart_tx: mpsc::Sender<()>,
) {
    loop {
        let command = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            received = commands.recv() => match received {
                Some(command) => command,
                None => break,
            },
        };
        handle_command(&ctx, &restart_tx, command).await;
    }
    debug!("command loop drained");
}

/// Execute one command and deliver its result; a successful `restart`
/// additionally fires the supervisor's restart signal. The executor
/// itself stays oblivious to restart semantics.
pub(crate) async fn handle_command(
    ctx: &LoopCtx,
    restart_tx: &mpsc::Sender<()>,
    command: Command,
) {
    let is_restart = command.kind == CommandKind::Restart;
    let result = ctx.executor.execute(command, &ctx.cancel).await;
    ctx.status.record_command(epoch_ms(), result.success);
    let trigger_restart = is_restart && result.success;

    deliver_result(ctx, result).await;

    if trigger_restart {
        info!("restart command succeeded, signalling supervisor");
        let _ = restart_tx.try_send(());
    }
}

/// Push a result over the stream; fall back to the request transport
/// when the stream is down or its queue is full.
async fn deliver_result(ctx: &LoopCtx, result: CommandResult) {
    if ctx.stream.is_connected() {
        match ctx.stream.queue_result(result.clone()) {
            Ok(()) => return,
            Err(e) => warn!(error = %e, id = %result.id, "stream push failed, falling back"),
        }
    }

    let outcome = ctx
        .submit
        .submit(&ctx.cancel, || ctx.status.add_retries(1), || {
            let transport = Arc::clone(&ctx.transport);
            let cancel = ctx.cancel.clone();
            let result = result.clone();
            async move { transport.send_command_result(&result, &cancel).await }
        })
        .await;
    if let Err(e) = outcome {
        warn!(error = %e, id = %result.id, "result delivery failed on both transports");
        ctx.status.record_error();
    }
}

/// Status loop: refresh uptime and publish a snapshot for observers.
pub(crate) async fn status_loop(
    ctx: LoopCtx,
    reports: watch::Sender<StatusReport>,
    started: Instant,
) {
    let mut pulse = ticker(STATUS_INTERVAL);

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = pulse.tick() => {}
        }

        ctx.status.set_uptime_s(started.elapsed().as_secs());
        let report = StatusReport {
            agent: ctx.status.snapshot(),
            executor: ctx.executor.snapshot(),
            stream_connected: ctx.stream.is_connected(),
        };
        let _ = reports.send(report);
    }
    debug!("status loop drained");
}
