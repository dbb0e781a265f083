// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use mm_core::ManualClock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Scripted probe: counts calls, can be told to fail.
#[derive(Default)]
struct ScriptedProbe {
    inventory_calls: AtomicU32,
    health_calls: AtomicU32,
    fail: AtomicBool,
}

impl ScriptedProbe {
    fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SystemProbe for ScriptedProbe {
    async fn collect_inventory(
        &self,
        machine_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Inventory, ProbeError> {
        let n = self.inventory_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProbeError::Collection("boom".to_string()));
        }
        let mut inv = Inventory::empty(machine_id);
        inv.system.hostname = format!("collection-{}", n);
        Ok(inv)
    }

    async fn collect_health(&self, _cancel: &CancellationToken) -> Result<HealthSample, ProbeError> {
        let n = self.health_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProbeError::Collection("boom".to_string()));
        }
        Ok(HealthSample::from_usage(n as f32, 0.0, 0.0))
    }
}

fn collector(ttl_s: u64) -> (Collector<ScriptedProbe, ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    let c = Collector::new(ScriptedProbe::default(), clock.clone(), Duration::from_secs(ttl_s));
    (c, clock)
}

#[tokio::test]
async fn fresh_cache_is_served_without_probing() {
    let (collector, _clock) = collector(60);
    let cancel = CancellationToken::new();

    let first = collector.collect_inventory("m", &cancel).await.unwrap();
    let second = collector.collect_inventory("m", &cancel).await.unwrap();
    assert_eq!(first.system.hostname, "collection-1");
    assert_eq!(second.system.hostname, "collection-1");
    assert_eq!(collector.probe.inventory_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn expired_cache_triggers_fresh_collection() {
    let (collector, clock) = collector(60);
    let cancel = CancellationToken::new();

    collector.collect_inventory("m", &cancel).await.unwrap();
    clock.advance(Duration::from_secs(61));
    let refreshed = collector.collect_inventory("m", &cancel).await.unwrap();
    assert_eq!(refreshed.system.hostname, "collection-2");
}

#[tokio::test]
async fn stale_entry_served_when_collection_fails() {
    let (collector, clock) = collector(60);
    let cancel = CancellationToken::new();

    let first = collector.collect_inventory("m", &cancel).await.unwrap();
    clock.advance(Duration::from_secs(61));
    collector.probe.set_fail(true);
    let fallback = collector.collect_inventory("m", &cancel).await.unwrap();
    assert_eq!(fallback.system.hostname, first.system.hostname);
}

#[tokio::test]
async fn failure_with_no_entry_surfaces_error() {
    let (collector, _clock) = collector(60);
    let cancel = CancellationToken::new();

    collector.probe.set_fail(true);
    let err = collector.collect_inventory("m", &cancel).await.unwrap_err();
    assert!(matches!(err, ProbeError::Collection(_)));
}

#[tokio::test]
async fn clear_cache_forces_recollection() {
    let (collector, _clock) = collector(60);
    let cancel = CancellationToken::new();

    collector.collect_health(&cancel).await.unwrap();
    collector.clear_cache();
    let second = collector.collect_health(&cancel).await.unwrap();
    assert_eq!(second.cpu_pct, 2.0);
}

#[tokio::test]
async fn health_cache_follows_same_ttl() {
    let (collector, clock) = collector(30);
    let cancel = CancellationToken::new();

    let a = collector.collect_health(&cancel).await.unwrap();
    let b = collector.collect_health(&cancel).await.unwrap();
    assert_eq!(a, b);
    clock.advance(Duration::from_secs(31));
    let c = collector.collect_health(&cancel).await.unwrap();
    assert_eq!(c.cpu_pct, 2.0);
}
