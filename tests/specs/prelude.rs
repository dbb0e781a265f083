// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared spec harness: a miniature backend double serving the agent's
//! HTTP endpoints (every request recorded, answered `200 []`) and the
//! `/agent-ws` duplex channel (sessions handed to the test to drive).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

pub use futures_util::{SinkExt, StreamExt};
pub use mm_core::AgentState;
pub use mm_daemon::config::Config;
pub use mm_daemon::lifecycle::{Outcome, Supervisor};
pub use mm_wire::CommandKind;
pub use tokio_tungstenite::tungstenite::Message;

pub type WsSession = tokio_tungstenite::WebSocketStream<TcpStream>;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

pub struct MiniBackend {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    ws_sessions: tokio::sync::Mutex<mpsc::Receiver<WsSession>>,
}

impl MiniBackend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::new(Mutex::new(Vec::new()));
        let (ws_tx, ws_rx) = mpsc::channel(4);

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { break };
                let recorded = Arc::clone(&recorded);
                let ws_tx = ws_tx.clone();
                tokio::spawn(handle_connection(stream, recorded, ws_tx));
            }
        });

        Self { base_url, requests, ws_sessions: tokio::sync::Mutex::new(ws_rx) }
    }

    /// Wait for the agent to open (or re-open) the duplex channel.
    pub async fn next_ws_session(&self, timeout: Duration) -> WsSession {
        let mut rx = self.ws_sessions.lock().await;
        tokio::time::timeout(timeout, rx.recv())
            .await
            .expect("timed out waiting for a ws session")
            .expect("backend listener gone")
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count_posts(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == "POST" && r.path == path)
            .count()
    }
}

async fn handle_connection(
    stream: TcpStream,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
    ws_tx: mpsc::Sender<WsSession>,
) {
    // Sniff the request line without consuming it so a websocket upgrade
    // can be handed to the handshake with the stream intact.
    let mut head = String::new();
    for _ in 0..100 {
        let mut buf = [0u8; 256];
        let n = match stream.peek(&mut buf).await {
            Ok(0) => return,
            Ok(n) => n,
            Err(_) => return,
        };
        head = String::from_utf8_lossy(&buf[..n]).into_owned();
        if head.contains("\r\n") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    if head.starts_with("GET /agent-ws") {
        if let Ok(session) = tokio_tungstenite::accept_async(stream).await {
            let _ = ws_tx.send(session).await;
        }
        return;
    }
    serve_http(stream, recorded).await;
}

/// Minimal HTTP/1.1 responder: record each request, answer `200` with an
/// empty JSON array. Loops because the client reuses connections.
async fn serve_http(mut stream: TcpStream, recorded: Arc<Mutex<Vec<RecordedRequest>>>) {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);

    loop {
        let mut request_line = String::new();
        match reader.read_line(&mut request_line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or("").to_string();
        let path = parts.next().unwrap_or("").to_string();

        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            if line == "\r\n" || line == "\n" {
                break;
            }
            let lower = line.to_ascii_lowercase();
            if let Some(value) = lower.strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }

        let mut body = vec![0u8; content_length];
        if content_length > 0 && reader.read_exact(&mut body).await.is_err() {
            return;
        }

        recorded.lock().unwrap().push(RecordedRequest {
            method,
            path,
            body: String::from_utf8_lossy(&body).into_owned(),
        });

        let response =
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 2\r\n\r\n[]";
        if write_half.write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Agent configuration tuned for fast spec runs.
pub fn spec_config(base_url: &str) -> Config {
    Config {
        machine_id: "m-spec".to_string(),
        base_url: base_url.to_string(),
        api_key: "spec-key".to_string(),
        heartbeat_interval: Duration::from_millis(200),
        inventory_interval: Duration::from_secs(1),
        cache_ttl: Duration::from_millis(500),
        request_timeout: Duration::from_secs(5),
        reconnect_interval: Duration::from_millis(100),
        ping_interval: Duration::from_secs(5),
        read_idle_timeout: Duration::from_secs(30),
        write_timeout: Duration::from_secs(5),
        max_retries: 0,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(10),
        backoff_multiplier: 2.0,
        backoff_jitter: false,
        max_concurrency: 2,
        allowed_kinds: CommandKind::all().into_iter().collect(),
        log_level: None,
        log_file: None,
        log_max_size_mb: None,
        log_max_age_days: None,
    }
}

/// Read frames from a ws session until a text frame arrives.
pub async fn next_text_frame(session: &mut WsSession) -> serde_json::Value {
    loop {
        match tokio::time::timeout(Duration::from_secs(10), session.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return serde_json::from_str(&text).expect("frame is json");
            }
            Ok(Some(Ok(Message::Ping(payload)))) => {
                let _ = session.send(Message::Pong(payload)).await;
            }
            Ok(Some(Ok(_))) => continue,
            other => panic!("expected a text frame, got {:?}", other),
        }
    }
}
