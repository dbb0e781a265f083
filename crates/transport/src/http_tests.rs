// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use httpmock::prelude::*;
use mm_core::AgentStatus;
use mm_wire::HeartbeatData;

fn transport(server: &MockServer) -> RequestTransport {
    RequestTransport::new(&server.base_url(), "secret", "m-1", Duration::from_secs(5))
        .expect("client builds")
}

fn heartbeat() -> HeartbeatData {
    let status = AgentStatus::new(0);
    HeartbeatData::from_status("m-1", "0.3.0", &status.snapshot())
}

#[tokio::test]
async fn heartbeat_posts_json_with_bearer() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/agentes/m-1/heartbeat")
                .header("authorization", "Bearer secret")
                .header("content-type", "application/json");
            then.status(200);
        })
        .await;

    let cancel = CancellationToken::new();
    transport(&server).send_heartbeat(&heartbeat(), &cancel).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn register_wraps_inventory_with_machine_id() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/agentes/m-1")
                .json_body_partial(r#"{"machine_id": "m-1"}"#);
            then.status(201);
        })
        .await;

    let cancel = CancellationToken::new();
    let inventory = Inventory::empty("m-1");
    transport(&server).register(&inventory, &cancel).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn non_2xx_carries_status_and_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/agentes/m-1/inventory");
            then.status(500).body("database exploded");
        })
        .await;

    let cancel = CancellationToken::new();
    let err = transport(&server)
        .send_inventory(&Inventory::empty("m-1"), &cancel)
        .await
        .unwrap_err();
    match err {
        TransportError::Status { status, body } => {
            assert_eq!(status, 500);
            assert!(body.contains("database exploded"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn command_result_path_includes_command_id() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/agentes/m-1/commands/c-42/result");
            then.status(200);
        })
        .await;

    let cancel = CancellationToken::new();
    let result = CommandResult::rejected("c-42", -1, "command kind not permitted");
    transport(&server).send_command_result(&result, &cancel).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn fetch_pending_commands_decodes_list() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/agentes/m-1/commands");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"[{"id": "c1", "kind": "info"}, {"id": "c2", "kind": "ping", "args": ["localhost"]}]"#);
        })
        .await;

    let cancel = CancellationToken::new();
    let commands = transport(&server).fetch_pending_commands(&cancel).await.unwrap();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].id, "c1");
    assert_eq!(commands[1].args, vec!["localhost"]);
}

#[tokio::test]
async fn ping_hits_api_ping() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/ping");
            then.status(200);
        })
        .await;

    let cancel = CancellationToken::new();
    transport(&server).ping(Duration::from_secs(5), &cancel).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn cancelled_token_short_circuits() {
    let server = MockServer::start_async().await;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = transport(&server).ping(Duration::from_secs(5), &cancel).await.unwrap_err();
    assert!(matches!(err, TransportError::Cancelled));
}

#[test]
fn long_error_bodies_are_truncated() {
    let body = "x".repeat(5000);
    let truncated = truncate_body(&body);
    assert!(truncated.len() < 600);
    assert!(truncated.contains("5000 bytes"));
}
