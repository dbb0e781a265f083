// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Duplex-channel framing.
//!
//! Every frame is a JSON text message `{"type": ..., "data": ...}`.
//! Inbound frames with an unrecognized type are surfaced as `Unknown`
//! so the caller can log and ignore them without failing the connection.

use serde_json::Value;
use thiserror::Error;

use crate::{Command, CommandResult};

pub const TYPE_COMMAND: &str = "command";
pub const TYPE_PING: &str = "ping";
pub const TYPE_COMMAND_RESULT: &str = "command_result";
pub const TYPE_PONG: &str = "pong";

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Command(Box<Command>),
    Ping,
    Unknown { kind: String, raw: Value },
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid frame json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame missing string `type` field")]
    MissingType,
}

/// Parse an inbound text frame.
pub fn parse_inbound(text: &str) -> Result<InboundFrame, FrameError> {
    let value: Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or(FrameError::MissingType)?
        .to_string();

    match kind.as_str() {
        TYPE_COMMAND => {
            let data = value.get("data").cloned().unwrap_or(Value::Null);
            let command: Command = serde_json::from_value(data)?;
            Ok(InboundFrame::Command(Box::new(command)))
        }
        TYPE_PING => Ok(InboundFrame::Ping),
        _ => Ok(InboundFrame::Unknown { kind, raw: value }),
    }
}

/// Encode a `command_result` frame.
pub fn command_result_frame(result: &CommandResult) -> Result<String, serde_json::Error> {
    let data = serde_json::to_value(result)?;
    Ok(serde_json::json!({ "type": TYPE_COMMAND_RESULT, "data": data }).to_string())
}

/// Encode the `pong` reply to a protocol-level ping.
pub fn pong_frame(machine_id: &str, epoch_ms: u64) -> String {
    serde_json::json!({
        "type": TYPE_PONG,
        "data": { "machine_id": machine_id, "timestamp": epoch_ms },
    })
    .to_string()
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
