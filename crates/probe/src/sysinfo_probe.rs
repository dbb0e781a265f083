// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sysinfo`-backed platform probe.
//!
//! All collection happens on the blocking pool under a time budget, so a
//! wedged platform API cannot stall the agent's activity loops.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mm_core::HealthSample;
use mm_wire::{
    DiskVolume, HardwareInfo, Inventory, NetworkInterface, ProcessEntry, SystemInfo,
};
use parking_lot::Mutex;
use sysinfo::{Disks, Networks, ProcessesToUpdate, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tokio_util::sync::CancellationToken;

use crate::{ProbeError, SystemProbe};

/// Platform probe reading through the `sysinfo` crate.
pub struct SysinfoProbe {
    budget: Duration,
    sys: Arc<Mutex<System>>,
}

impl SysinfoProbe {
    /// `budget` bounds each collection; callers size it well below their
    /// own submission deadline.
    pub fn new(budget: Duration) -> Self {
        Self { budget, sys: Arc::new(Mutex::new(System::new_all())) }
    }
}

#[async_trait]
impl SystemProbe for SysinfoProbe {
    async fn collect_inventory(
        &self,
        machine_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Inventory, ProbeError> {
        let sys = Arc::clone(&self.sys);
        let machine_id = machine_id.to_string();
        run_bounded(cancel, self.budget, move || build_inventory(&machine_id, &sys)).await
    }

    async fn collect_health(&self, cancel: &CancellationToken) -> Result<HealthSample, ProbeError> {
        let sys = Arc::clone(&self.sys);
        run_bounded(cancel, self.budget, move || sample_health(&sys)).await
    }
}

/// Run `work` on the blocking pool, racing the cancel token and the budget.
async fn run_bounded<T, F>(
    cancel: &CancellationToken,
    budget: Duration,
    work: F,
) -> Result<T, ProbeError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(work);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProbeError::Cancelled),
        joined = tokio::time::timeout(budget, handle) => match joined {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(join_err)) => Err(ProbeError::Collection(join_err.to_string())),
            Err(_) => Err(ProbeError::Timeout(budget)),
        },
    }
}

fn build_inventory(machine_id: &str, sys: &Mutex<System>) -> Inventory {
    let mut sys = sys.lock();
    sys.refresh_memory();
    sys.refresh_cpu_usage();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let mut inv = Inventory::empty(machine_id);
    inv.system = SystemInfo {
        hostname: System::host_name().unwrap_or_default(),
        os_family: std::env::consts::OS.to_string(),
        os_version: System::long_os_version()
            .or_else(System::os_version)
            .unwrap_or_default(),
        architecture: std::env::consts::ARCH.to_string(),
        uptime_s: System::uptime(),
    };
    inv.hardware = HardwareInfo {
        cpu_model: sys.cpus().first().map(|c| c.brand().to_string()).unwrap_or_default(),
        cpu_cores: sys.cpus().len(),
        cpu_usage_pct: sys.global_cpu_usage(),
        mem_total_bytes: sys.total_memory(),
        mem_used_bytes: sys.used_memory(),
        disks: collect_disks(),
    };
    // Installed applications and service tables have no portable source;
    // those sections stay empty and the report remains valid.
    inv.software.processes = sys
        .processes()
        .values()
        .map(|p| ProcessEntry {
            pid: p.pid().as_u32(),
            name: p.name().to_string_lossy().into_owned(),
            cpu_pct: p.cpu_usage(),
            mem_bytes: p.memory(),
        })
        .collect();
    inv.network.interfaces = collect_interfaces();
    inv
}

fn sample_health(sys: &Mutex<System>) -> HealthSample {
    let mut sys = sys.lock();
    sys.refresh_memory();
    sys.refresh_cpu_usage();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();

    let cpu_pct = sys.global_cpu_usage();
    let mem_pct = percent(sys.used_memory(), sys.total_memory());
    let disk_pct = Disks::new_with_refreshed_list()
        .iter()
        .map(|d| percent(d.total_space().saturating_sub(d.available_space()), d.total_space()))
        .fold(0.0_f32, f32::max);

    HealthSample::from_usage(cpu_pct, mem_pct, disk_pct)
}

fn collect_disks() -> Vec<DiskVolume> {
    Disks::new_with_refreshed_list()
        .iter()
        .map(|disk| DiskVolume {
            name: disk.name().to_string_lossy().into_owned(),
            mount_point: disk.mount_point().display().to_string(),
            filesystem: disk.file_system().to_string_lossy().into_owned(),
            total_bytes: disk.total_space(),
            available_bytes: disk.available_space(),
        })
        .collect()
}

fn collect_interfaces() -> Vec<NetworkInterface> {
    Networks::new_with_refreshed_list()
        .iter()
        .map(|(name, data)| NetworkInterface {
            name: name.clone(),
            addresses: data
                .ip_networks()
                .iter()
                .map(|ip| format!("{}/{}", ip.addr, ip.prefix))
                .collect(),
            rx_bytes: data.total_received(),
            tx_bytes: data.total_transmitted(),
        })
        .collect()
}

fn percent(used: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64 * 100.0) as f32
}

#[cfg(test)]
#[path = "sysinfo_probe_tests.rs"]
mod tests;
