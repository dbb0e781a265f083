// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TTL snapshot cache in front of the platform probe.
//!
//! One slot per probe kind. A slot younger than the TTL is served as-is;
//! an expired slot triggers a fresh collection that atomically replaces
//! it on success. A failed collection falls back to the stale slot when
//! one exists, so transient probe failures never surface to callers that
//! have seen at least one good snapshot.

use std::time::{Duration, Instant};

use mm_core::{Clock, HealthSample};
use mm_wire::Inventory;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{ProbeError, SystemProbe};

struct Cached<T> {
    inserted_at: Instant,
    value: T,
}

#[derive(Default)]
struct Slots {
    inventory: Option<Cached<Inventory>>,
    health: Option<Cached<HealthSample>>,
}

/// Caching collector wrapping a [`SystemProbe`].
pub struct Collector<P, C: Clock> {
    probe: P,
    clock: C,
    cache_ttl: Duration,
    slots: Mutex<Slots>,
}

impl<P: SystemProbe, C: Clock> Collector<P, C> {
    pub fn new(probe: P, clock: C, cache_ttl: Duration) -> Self {
        Self { probe, clock, cache_ttl, slots: Mutex::new(Slots::default()) }
    }

    /// Collect an inventory report, serving the cached snapshot while it
    /// is younger than the TTL.
    pub async fn collect_inventory(
        &self,
        machine_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Inventory, ProbeError> {
        let now = self.clock.now();
        {
            let slots = self.slots.lock();
            if let Some(cached) = &slots.inventory {
                if now.duration_since(cached.inserted_at) < self.cache_ttl {
                    return Ok(cached.value.clone());
                }
            }
        }

        match self.probe.collect_inventory(machine_id, cancel).await {
            Ok(fresh) => {
                let mut slots = self.slots.lock();
                slots.inventory = Some(Cached { inserted_at: self.clock.now(), value: fresh.clone() });
                Ok(fresh)
            }
            Err(e) => {
                let slots = self.slots.lock();
                match &slots.inventory {
                    Some(stale) => {
                        warn!(error = %e, "inventory probe failed, serving stale snapshot");
                        Ok(stale.value.clone())
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Collect a health sample, serving the cached one while it is
    /// younger than the TTL.
    pub async fn collect_health(
        &self,
        cancel: &CancellationToken,
    ) -> Result<HealthSample, ProbeError> {
        let now = self.clock.now();
        {
            let slots = self.slots.lock();
            if let Some(cached) = &slots.health {
                if now.duration_since(cached.inserted_at) < self.cache_ttl {
                    return Ok(cached.value);
                }
            }
        }

        match self.probe.collect_health(cancel).await {
            Ok(fresh) => {
                let mut slots = self.slots.lock();
                slots.health = Some(Cached { inserted_at: self.clock.now(), value: fresh });
                Ok(fresh)
            }
            Err(e) => {
                let slots = self.slots.lock();
                match &slots.health {
                    Some(stale) => {
                        warn!(error = %e, "health probe failed, serving stale sample");
                        Ok(stale.value)
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Drop both cached snapshots; the next call collects fresh.
    pub fn clear_cache(&self) {
        let mut slots = self.slots.lock();
        slots.inventory = None;
        slots.health = None;
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
