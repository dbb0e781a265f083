// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream transport: persistent duplex channel to the backend.
//!
//! A single background task owns the connection. Inbound `command`
//! frames land on a bounded channel consumed by the command loop;
//! outbound results are queued on a bounded channel and re-attempted
//! FIFO across reconnects. Keep-alive is a protocol ping every
//! `ping_interval`; a silent read side or a slow write tears the
//! connection down and schedules a reconnect.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use mm_core::{epoch_ms, AgentStatus};
use mm_wire::{
    command_result_frame, parse_inbound, pong_frame, Command, CommandResult, InboundFrame,
};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Notify};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, http, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of the inbound command and outbound result queues.
pub const QUEUE_CAPACITY: usize = 100;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Derive the duplex endpoint from the backend base URL: scheme swapped
/// http↔ws and `/agent-ws` appended.
pub fn ws_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    let swapped = if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        trimmed.to_string()
    } else {
        format!("ws://{trimmed}")
    };
    format!("{swapped}/agent-ws")
}

/// Connection state of the stream, observable through the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

#[derive(Debug, Error)]
pub enum StreamSendError {
    #[error("outbound result queue full")]
    QueueFull,

    #[error("stream transport stopped")]
    Stopped,
}

/// Stream transport configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub base_url: String,
    pub api_key: String,
    pub machine_id: String,
    pub reconnect_interval: Duration,
    pub ping_interval: Duration,
    pub read_idle_timeout: Duration,
    pub write_timeout: Duration,
}

impl StreamConfig {
    pub fn new(base_url: &str, api_key: &str, machine_id: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            machine_id: machine_id.to_string(),
            reconnect_interval: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
            read_idle_timeout: Duration::from_secs(90),
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Handle to the running stream task.
#[derive(Clone)]
pub struct StreamHandle {
    outbound_tx: mpsc::Sender<CommandResult>,
    state_rx: watch::Receiver<LinkState>,
    reconnect: Arc<Notify>,
}

impl StreamHandle {
    /// Queue a result for delivery. Non-blocking; a full queue is a
    /// non-fatal error the caller may route through the fallback path.
    pub fn queue_result(&self, result: CommandResult) -> Result<(), StreamSendError> {
        self.outbound_tx.try_send(result).map_err(|e| match e {
            mpsc::error::TrySendError::Full(dropped) => {
                warn!(id = %dropped.id, "outbound result queue full, dropping");
                StreamSendError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => StreamSendError::Stopped,
        })
    }

    pub fn state(&self) -> LinkState {
        *self.state_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Cut a pending reconnect sleep short.
    pub fn nudge_reconnect(&self) {
        self.reconnect.notify_one();
    }
}

/// The stream transport task spawner.
pub struct StreamTransport;

impl StreamTransport {
    /// Spawn the connection task. Returns the handle and the inbound
    /// command receiver (handed out exactly once).
    pub fn spawn(
        config: StreamConfig,
        status: Arc<AgentStatus>,
        cancel: CancellationToken,
    ) -> (StreamHandle, mpsc::Receiver<Command>) {
        let (commands_tx, commands_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (state_tx, state_rx) = watch::channel(LinkState::Disconnected);
        let reconnect = Arc::new(Notify::new());

        let handle =
            StreamHandle { outbound_tx, state_rx, reconnect: Arc::clone(&reconnect) };
        tokio::spawn(run(config, status, cancel, commands_tx, outbound_rx, state_tx, reconnect));
        (handle, commands_rx)
    }
}

enum DriveEnd {
    Cancelled,
    Failed,
}

async fn run(
    config: StreamConfig,
    status: Arc<AgentStatus>,
    cancel: CancellationToken,
    commands_tx: mpsc::Sender<Command>,
    mut outbound_rx: mpsc::Receiver<CommandResult>,
    state_tx: watch::Sender<LinkState>,
    reconnect: Arc<Notify>,
) {
    let mut pending: VecDeque<CommandResult> = VecDeque::new();
    let mut had_connection = false;

    while !cancel.is_cancelled() {
        let _ = state_tx.send(LinkState::Connecting);
        match connect(&config).await {
            Ok(ws) => {
                if had_connection {
                    status.record_reconnect();
                }
                had_connection = true;
                let _ = state_tx.send(LinkState::Connected);
                info!(url = %ws_url(&config.base_url), "stream connected");

                let end = drive(
                    ws,
                    &config,
                    &status,
                    &cancel,
                    &commands_tx,
                    &mut outbound_rx,
                    &mut pending,
                )
                .await;
                let _ = state_tx.send(LinkState::Disconnected);
                if matches!(end, DriveEnd::Cancelled) {
                    break;
                }
            }
            Err(e) => {
                let _ = state_tx.send(LinkState::Disconnected);
                warn!(error = %e, "stream connect failed");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(config.reconnect_interval) => {}
            _ = reconnect.notified() => {
                debug!("reconnect nudged");
            }
        }
    }
    let _ = state_tx.send(LinkState::Closed);
}

async fn connect(config: &StreamConfig) -> Result<WsStream, tungstenite::Error> {
    let url = ws_url(&config.base_url);
    let mut request = url.as_str().into_client_request()?;
    let bearer = format!("Bearer {}", config.api_key);
    let value = http::HeaderValue::from_str(&bearer)
        .map_err(|e| tungstenite::Error::HttpFormat(http::Error::from(e)))?;
    request.headers_mut().insert(http::header::AUTHORIZATION, value);
    let (ws, _response) = connect_async(request).await?;
    Ok(ws)
}

async fn drive(
    ws: WsStream,
    config: &StreamConfig,
    status: &AgentStatus,
    cancel: &CancellationToken,
    commands_tx: &mpsc::Sender<Command>,
    outbound_rx: &mut mpsc::Receiver<CommandResult>,
    pending: &mut VecDeque<CommandResult>,
) -> DriveEnd {
    let (mut write, mut read) = ws.split();

    // Results queued while the previous connection was down go first.
    if flush_pending(&mut write, pending, config.write_timeout).await.is_err() {
        return DriveEnd::Failed;
    }

    let mut keepalive = tokio::time::interval(config.ping_interval);
    keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    keepalive.tick().await; // first tick fires immediately

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                // best-effort: results already queued go out before the close
                while let Ok(result) = outbound_rx.try_recv() {
                    pending.push_back(result);
                }
                let _ = flush_pending(&mut write, pending, config.write_timeout).await;
                let _ = write.send(Message::Close(None)).await;
                return DriveEnd::Cancelled;
            }
            _ = keepalive.tick() => {
                if let Err(reason) =
                    timed_send(&mut write, Message::Ping(Vec::new().into()), config.write_timeout).await
                {
                    warn!(%reason, "keep-alive ping failed");
                    return DriveEnd::Failed;
                }
            }
            queued = outbound_rx.recv() => {
                match queued {
                    Some(result) => {
                        pending.push_back(result);
                        if flush_pending(&mut write, pending, config.write_timeout).await.is_err() {
                            return DriveEnd::Failed;
                        }
                    }
                    // all senders dropped: the agent is shutting down
                    None => return DriveEnd::Cancelled,
                }
            }
            frame = tokio::time::timeout(config.read_idle_timeout, read.next()) => {
                match frame {
                    Err(_) => {
                        warn!(idle = ?config.read_idle_timeout, "stream read idle, reconnecting");
                        return DriveEnd::Failed;
                    }
                    Ok(None) => {
                        warn!("stream closed by peer");
                        return DriveEnd::Failed;
                    }
                    Ok(Some(Err(e))) => {
                        warn!(error = %e, "stream read error");
                        return DriveEnd::Failed;
                    }
                    Ok(Some(Ok(message))) => {
                        match on_message(message, config, status, commands_tx) {
                            MessageAction::None => {}
                            MessageAction::Reply(text) => {
                                if let Err(reason) =
                                    timed_send(&mut write, Message::Text(text.into()), config.write_timeout).await
                                {
                                    warn!(%reason, "reply send failed");
                                    return DriveEnd::Failed;
                                }
                            }
                            MessageAction::Pong(payload) => {
                                if let Err(reason) =
                                    timed_send(&mut write, Message::Pong(payload), config.write_timeout).await
                                {
                                    warn!(%reason, "pong send failed");
                                    return DriveEnd::Failed;
                                }
                            }
                            MessageAction::Closed => return DriveEnd::Failed,
                        }
                    }
                }
            }
        }
    }
}

enum MessageAction {
    None,
    Reply(String),
    Pong(tungstenite::Bytes),
    Closed,
}

fn on_message(
    message: Message,
    config: &StreamConfig,
    status: &AgentStatus,
    commands_tx: &mpsc::Sender<Command>,
) -> MessageAction {
    match message {
        Message::Text(text) => match parse_inbound(&text) {
            Ok(InboundFrame::Command(command)) => {
                match commands_tx.try_send(*command) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(dropped)) => {
                        warn!(id = %dropped.id, "inbound command queue full, dropping");
                        status.record_error();
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {}
                }
                MessageAction::None
            }
            Ok(InboundFrame::Ping) => {
                MessageAction::Reply(pong_frame(&config.machine_id, epoch_ms()))
            }
            Ok(InboundFrame::Unknown { kind, .. }) => {
                debug!(%kind, "ignoring unknown frame type");
                MessageAction::None
            }
            Err(e) => {
                warn!(error = %e, "ignoring malformed frame");
                MessageAction::None
            }
        },
        Message::Ping(payload) => MessageAction::Pong(payload),
        Message::Close(_) => {
            warn!("stream received close frame");
            MessageAction::Closed
        }
        // pongs and binary frames are noise here
        _ => MessageAction::None,
    }
}

async fn flush_pending(
    write: &mut WsSink,
    pending: &mut VecDeque<CommandResult>,
    write_timeout: Duration,
) -> Result<(), String> {
    while let Some(front) = pending.front() {
        match command_result_frame(front) {
            Ok(text) => {
                timed_send(write, Message::Text(text.into()), write_timeout).await?;
                pending.pop_front();
            }
            Err(e) => {
                warn!(error = %e, id = %front.id, "dropping unencodable result");
                pending.pop_front();
            }
        }
    }
    Ok(())
}

/// Send one frame under the write timeout.
async fn timed_send(
    write: &mut WsSink,
    message: Message,
    timeout: Duration,
) -> Result<(), String> {
    match tokio::time::timeout(timeout, write.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("write failed: {e}")),
        Err(_) => Err(format!("write timed out after {}s", timeout.as_secs())),
    }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
