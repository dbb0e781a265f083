// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor lifecycle specs: registration, periodic reporting, and
//! shutdown discipline.

use crate::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn agent_registers_reports_and_stops_cleanly() {
    let backend = MiniBackend::start().await;
    let supervisor = Arc::new(Supervisor::new(spec_config(&backend.base_url)));

    let runner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };

    // wait for the agent to come up
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while supervisor.status().state() != AgentState::Running {
        assert!(std::time::Instant::now() < deadline, "agent never reached Running");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // let heartbeat (200ms) and inventory (1s, initial immediate) cycle
    tokio::time::sleep(Duration::from_secs(3)).await;

    let snapshot = supervisor.status().snapshot();
    assert_eq!(snapshot.state, AgentState::Running);
    assert!(snapshot.heartbeats_sent >= 5, "got {} heartbeats", snapshot.heartbeats_sent);
    assert!(snapshot.inventories_sent >= 2, "got {} inventories", snapshot.inventories_sent);
    assert!(snapshot.last_heartbeat_ok_ms > 0);

    // the backend saw the register call and the periodic submissions
    assert_eq!(backend.count_posts("/api/agentes/m-spec"), 1);
    assert!(backend.count_posts("/api/agentes/m-spec/heartbeat") >= 5);
    assert!(backend.count_posts("/api/agentes/m-spec/inventory") >= 2);

    // stop is idempotent and drains to Stopped
    supervisor.stop();
    supervisor.stop();
    let outcome = runner.await.unwrap().unwrap();
    assert_eq!(outcome, Outcome::Stopped);
    assert_eq!(supervisor.status().state(), AgentState::Stopped);
}

#[tokio::test]
async fn heartbeat_carries_health_and_counters() {
    let backend = MiniBackend::start().await;
    let supervisor = Arc::new(Supervisor::new(spec_config(&backend.base_url)));
    let runner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while backend.count_posts("/api/agentes/m-spec/heartbeat") < 2 {
        assert!(std::time::Instant::now() < deadline, "no heartbeats arrived");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let beats: Vec<_> = backend
        .requests()
        .into_iter()
        .filter(|r| r.path == "/api/agentes/m-spec/heartbeat")
        .collect();
    let body: serde_json::Value = serde_json::from_str(&beats[0].body).unwrap();
    assert_eq!(body["machine_id"], "m-spec");
    assert_eq!(body["state"], "running");
    assert!(body["health"]["status"].is_string());
    assert!(body["counters"]["heartbeats_sent"].is_u64());
    assert!(body["version"].is_string());

    supervisor.stop();
    let _ = runner.await.unwrap();
}

#[tokio::test]
async fn status_reports_are_published_to_observers() {
    let backend = MiniBackend::start().await;
    let supervisor = Arc::new(Supervisor::new(spec_config(&backend.base_url)));
    let mut reports = supervisor.subscribe();
    let runner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };

    // the status loop publishes every 5s; its first tick is immediate
    tokio::time::timeout(Duration::from_secs(15), reports.changed()).await.unwrap().unwrap();
    let report = reports.borrow().clone();
    assert_eq!(report.agent.state, AgentState::Running);
    assert_eq!(report.executor.max_concurrency, 2);
    assert_eq!(report.executor.in_use, 0);

    supervisor.stop();
    let _ = runner.await.unwrap();
}
