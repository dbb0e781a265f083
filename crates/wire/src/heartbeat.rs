// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat payload.

use chrono::{DateTime, Utc};
use mm_core::{AgentState, HealthSample, StatusSnapshot};
use serde::{Deserialize, Serialize};

/// Compact liveness message sent every heartbeat interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatData {
    pub machine_id: String,
    pub state: AgentState,
    pub health: HealthSample,
    pub uptime_s: u64,
    pub version: String,
    pub counters: HeartbeatCounters,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatCounters {
    pub heartbeats_sent: u64,
    pub inventories_sent: u64,
    pub commands_run: u64,
    pub commands_failed: u64,
    pub errors: u64,
    pub retries: u64,
    pub reconnects: u64,
}

impl From<&StatusSnapshot> for HeartbeatCounters {
    fn from(snap: &StatusSnapshot) -> Self {
        Self {
            heartbeats_sent: snap.heartbeats_sent,
            inventories_sent: snap.inventories_sent,
            commands_run: snap.commands_run,
            commands_failed: snap.commands_failed,
            errors: snap.errors,
            retries: snap.retries,
            reconnects: snap.reconnects,
        }
    }
}

impl HeartbeatData {
    /// Build a heartbeat from the current status snapshot and health sample.
    pub fn from_status(machine_id: &str, version: &str, snap: &StatusSnapshot) -> Self {
        Self {
            machine_id: machine_id.to_string(),
            state: snap.state,
            health: snap.health,
            uptime_s: snap.uptime_s,
            version: version.to_string(),
            counters: HeartbeatCounters::from(snap),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
