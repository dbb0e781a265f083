// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health sample and threshold classification.

use serde::{Deserialize, Serialize};

/// Coarse health level derived from resource usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Warning,
    Critical,
}

impl HealthLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLevel::Healthy => "healthy",
            HealthLevel::Warning => "warning",
            HealthLevel::Critical => "critical",
        }
    }
}

/// Point-in-time resource usage snapshot with its derived level.
///
/// Thresholds: critical when cpu > 80 or mem > 90 or disk > 95;
/// warning when cpu > 60 or mem > 80 or disk > 85; healthy otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    pub cpu_pct: f32,
    pub mem_pct: f32,
    pub disk_pct: f32,
    pub status: HealthLevel,
}

impl HealthSample {
    /// Build a sample from raw usage percentages, classifying it.
    pub fn from_usage(cpu_pct: f32, mem_pct: f32, disk_pct: f32) -> Self {
        Self { cpu_pct, mem_pct, disk_pct, status: classify(cpu_pct, mem_pct, disk_pct) }
    }
}

impl Default for HealthSample {
    fn default() -> Self {
        Self { cpu_pct: 0.0, mem_pct: 0.0, disk_pct: 0.0, status: HealthLevel::Healthy }
    }
}

/// Classify usage percentages into a health level.
pub fn classify(cpu_pct: f32, mem_pct: f32, disk_pct: f32) -> HealthLevel {
    if cpu_pct > 80.0 || mem_pct > 90.0 || disk_pct > 95.0 {
        HealthLevel::Critical
    } else if cpu_pct > 60.0 || mem_pct > 80.0 || disk_pct > 85.0 {
        HealthLevel::Warning
    } else {
        HealthLevel::Healthy
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
