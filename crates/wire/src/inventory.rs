// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inventory report DTOs.
//!
//! A self-contained snapshot of the host: system identity, hardware,
//! software, and network state. `captured_at` reflects the oldest cached
//! datum that went into the report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub machine_id: String,
    pub captured_at: DateTime<Utc>,
    pub system: SystemInfo,
    pub hardware: HardwareInfo,
    pub software: SoftwareInfo,
    pub network: NetworkInfo,
    /// Platform-specific extensions, passed through opaquely.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extensions: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub os_family: String,
    pub os_version: String,
    pub architecture: String,
    pub uptime_s: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareInfo {
    pub cpu_model: String,
    pub cpu_cores: usize,
    pub cpu_usage_pct: f32,
    pub mem_total_bytes: u64,
    pub mem_used_bytes: u64,
    #[serde(default)]
    pub disks: Vec<DiskVolume>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskVolume {
    pub name: String,
    pub mount_point: String,
    pub filesystem: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoftwareInfo {
    #[serde(default)]
    pub applications: Vec<InstalledApp>,
    #[serde(default)]
    pub processes: Vec<ProcessEntry>,
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstalledApp {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub cpu_pct: f32,
    pub mem_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    #[serde(default)]
    pub interfaces: Vec<NetworkInterface>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    #[serde(default)]
    pub addresses: Vec<String>,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

impl Inventory {
    /// An empty report for the given machine, stamped now.
    ///
    /// Probes fill sections they can collect; anything left untouched
    /// stays at its zero value rather than failing the whole snapshot.
    pub fn empty(machine_id: &str) -> Self {
        Self {
            machine_id: machine_id.to_string(),
            captured_at: Utc::now(),
            system: SystemInfo::default(),
            hardware: HardwareInfo::default(),
            software: SoftwareInfo::default(),
            network: NetworkInfo::default(),
            extensions: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
#[path = "inventory_tests.rs"]
mod tests;
