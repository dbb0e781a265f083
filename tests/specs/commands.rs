// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command dispatch specs: backend-pushed commands through the duplex
//! channel, executed and answered with results.

use crate::prelude::*;
use std::sync::Arc;
use std::time::Duration;

async fn running_agent(backend: &MiniBackend) -> (Arc<Supervisor>, tokio::task::JoinHandle<Result<Outcome, mm_daemon::lifecycle::LifecycleError>>) {
    let supervisor = Arc::new(Supervisor::new(spec_config(&backend.base_url)));
    let runner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while supervisor.status().state() != AgentState::Running {
        assert!(std::time::Instant::now() < deadline, "agent never reached Running");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    (supervisor, runner)
}

#[tokio::test]
async fn shell_command_round_trips_a_result() {
    let backend = MiniBackend::start().await;
    let (supervisor, runner) = running_agent(&backend).await;
    let mut session = backend.next_ws_session(Duration::from_secs(10)).await;

    session
        .send(Message::Text(
            r#"{"type": "command", "data": {"id": "c1", "kind": "shell", "command": "echo hi"}}"#
                .into(),
        ))
        .await
        .unwrap();

    let frame = next_text_frame(&mut session).await;
    assert_eq!(frame["type"], "command_result");
    let data = &frame["data"];
    assert_eq!(data["id"], "c1");
    assert_eq!(data["success"], true);
    assert_eq!(data["exit_code"], 0);
    let output = data["output"].as_str().unwrap();
    assert!(output == "hi\n" || output == "hi\r\n", "got {:?}", output);

    assert_eq!(supervisor.status().snapshot().commands_run, 1);

    supervisor.stop();
    let _ = runner.await.unwrap();
}

#[tokio::test]
async fn dangerous_shell_command_is_rejected_over_the_wire() {
    let backend = MiniBackend::start().await;
    let (supervisor, runner) = running_agent(&backend).await;
    let mut session = backend.next_ws_session(Duration::from_secs(10)).await;

    session
        .send(Message::Text(
            r#"{"type": "command", "data": {"id": "c2", "kind": "shell", "command": "rm -rf /"}}"#
                .into(),
        ))
        .await
        .unwrap();

    let frame = next_text_frame(&mut session).await;
    let data = &frame["data"];
    assert_eq!(data["id"], "c2");
    assert_eq!(data["success"], false);
    assert!(data["exit_code"].as_i64().unwrap() < 0);
    assert!(data["error"].as_str().unwrap().contains("not permitted"));

    let snapshot = supervisor.status().snapshot();
    assert_eq!(snapshot.commands_run, 1);
    assert_eq!(snapshot.commands_failed, 1);

    supervisor.stop();
    let _ = runner.await.unwrap();
}

#[tokio::test]
async fn backend_ping_frame_is_answered_with_pong() {
    let backend = MiniBackend::start().await;
    let (supervisor, runner) = running_agent(&backend).await;
    let mut session = backend.next_ws_session(Duration::from_secs(10)).await;

    session.send(Message::Text(r#"{"type": "ping"}"#.into())).await.unwrap();

    let frame = next_text_frame(&mut session).await;
    assert_eq!(frame["type"], "pong");
    assert_eq!(frame["data"]["machine_id"], "m-spec");
    assert!(frame["data"]["timestamp"].is_u64());

    supervisor.stop();
    let _ = runner.await.unwrap();
}

#[tokio::test]
async fn successful_restart_command_resolves_run_into_restart() {
    let backend = MiniBackend::start().await;
    let (supervisor, runner) = running_agent(&backend).await;
    let mut session = backend.next_ws_session(Duration::from_secs(10)).await;

    session
        .send(Message::Text(
            r#"{"type": "command", "data": {"id": "c3", "kind": "restart"}}"#.into(),
        ))
        .await
        .unwrap();

    // the result is acknowledged before the supervisor tears down
    let frame = next_text_frame(&mut session).await;
    assert_eq!(frame["data"]["id"], "c3");
    assert_eq!(frame["data"]["success"], true);

    let outcome = tokio::time::timeout(Duration::from_secs(10), runner)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(outcome, Outcome::Restart);
    assert_eq!(supervisor.status().state(), AgentState::Stopped);
}

#[tokio::test]
async fn disallowed_kind_is_rejected_without_execution() {
    let backend = MiniBackend::start().await;
    let mut config = spec_config(&backend.base_url);
    config.allowed_kinds = [CommandKind::Info].into_iter().collect();
    let supervisor = Arc::new(Supervisor::new(config));
    let runner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };
    let mut session = backend.next_ws_session(Duration::from_secs(10)).await;

    session
        .send(Message::Text(
            r#"{"type": "command", "data": {"id": "c4", "kind": "shell", "command": "echo hi"}}"#
                .into(),
        ))
        .await
        .unwrap();

    let frame = next_text_frame(&mut session).await;
    assert_eq!(frame["data"]["id"], "c4");
    assert_eq!(frame["data"]["success"], false);
    assert_eq!(frame["data"]["exit_code"], -1);
    assert_eq!(frame["data"]["error"], "command kind not permitted");

    supervisor.stop();
    let _ = runner.await.unwrap();
}
