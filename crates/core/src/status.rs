// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared agent status block.
//!
//! Scalar counters are atomics so activity loops can bump them without
//! taking the lock; the composite fields (state, timestamps, last health
//! sample) live behind a reader/writer lock that is never held across I/O.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::HealthSample;

/// Agent lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Starting => "starting",
            AgentState::Running => "running",
            AgentState::Stopping => "stopping",
            AgentState::Stopped => "stopped",
            AgentState::Error => "error",
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared mutable status block for the running agent.
///
/// Counters are monotonically non-decreasing; per-category timestamps
/// are clamped so a late writer can never move one backwards.
pub struct AgentStatus {
    heartbeats_sent: AtomicU64,
    inventories_sent: AtomicU64,
    commands_run: AtomicU64,
    commands_failed: AtomicU64,
    errors: AtomicU64,
    retries: AtomicU64,
    reconnects: AtomicU64,
    inner: RwLock<StatusInner>,
}

struct StatusInner {
    state: AgentState,
    started_at_ms: u64,
    uptime_s: u64,
    last_heartbeat_ok_ms: u64,
    last_inventory_ok_ms: u64,
    last_command_ok_ms: u64,
    health: HealthSample,
}

/// Point-in-time copy of the status block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: AgentState,
    pub started_at_ms: u64,
    pub uptime_s: u64,
    pub heartbeats_sent: u64,
    pub inventories_sent: u64,
    pub commands_run: u64,
    pub commands_failed: u64,
    pub errors: u64,
    pub retries: u64,
    pub reconnects: u64,
    pub last_heartbeat_ok_ms: u64,
    pub last_inventory_ok_ms: u64,
    pub last_command_ok_ms: u64,
    pub health: HealthSample,
}

impl AgentStatus {
    pub fn new(started_at_ms: u64) -> Self {
        Self {
            heartbeats_sent: AtomicU64::new(0),
            inventories_sent: AtomicU64::new(0),
            commands_run: AtomicU64::new(0),
            commands_failed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            inner: RwLock::new(StatusInner {
                state: AgentState::Starting,
                started_at_ms,
                uptime_s: 0,
                last_heartbeat_ok_ms: 0,
                last_inventory_ok_ms: 0,
                last_command_ok_ms: 0,
                health: HealthSample::default(),
            }),
        }
    }

    pub fn state(&self) -> AgentState {
        self.inner.read().state
    }

    pub fn set_state(&self, state: AgentState) {
        self.inner.write().state = state;
    }

    pub fn record_heartbeat_ok(&self, now_ms: u64) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.write();
        inner.last_heartbeat_ok_ms = inner.last_heartbeat_ok_ms.max(now_ms);
    }

    pub fn record_inventory_ok(&self, now_ms: u64) {
        self.inventories_sent.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.write();
        inner.last_inventory_ok_ms = inner.last_inventory_ok_ms.max(now_ms);
    }

    /// Record one completed command; failures also bump `commands_failed`.
    pub fn record_command(&self, now_ms: u64, success: bool) {
        self.commands_run.fetch_add(1, Ordering::Relaxed);
        if success {
            let mut inner = self.inner.write();
            inner.last_command_ok_ms = inner.last_command_ok_ms.max(now_ms);
        } else {
            self.commands_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_retries(&self, count: u64) {
        self.retries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_health(&self, sample: HealthSample) {
        self.inner.write().health = sample;
    }

    pub fn set_uptime_s(&self, uptime_s: u64) {
        self.inner.write().uptime_s = uptime_s;
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let inner = self.inner.read();
        StatusSnapshot {
            state: inner.state,
            started_at_ms: inner.started_at_ms,
            uptime_s: inner.uptime_s,
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
            inventories_sent: self.inventories_sent.load(Ordering::Relaxed),
            commands_run: self.commands_run.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            last_heartbeat_ok_ms: inner.last_heartbeat_ok_ms,
            last_inventory_ok_ms: inner.last_inventory_ok_ms,
            last_command_ok_ms: inner.last_command_ok_ms,
            health: inner.health,
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
