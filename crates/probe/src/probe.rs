// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The platform probe contract.

use std::time::Duration;

use async_trait::async_trait;
use mm_core::HealthSample;
use mm_wire::Inventory;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from a platform probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe cancelled")]
    Cancelled,

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("collection failed: {0}")]
    Collection(String),
}

/// A platform-specific collector of host snapshots.
///
/// Implementations must honor cancellation, bound their own blocking
/// work, and fill zero values for subsystems they cannot read instead
/// of failing the whole snapshot.
#[async_trait]
pub trait SystemProbe: Send + Sync {
    async fn collect_inventory(
        &self,
        machine_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Inventory, ProbeError>;

    async fn collect_health(&self, cancel: &CancellationToken) -> Result<HealthSample, ProbeError>;
}
