// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command and command-result DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of command kinds the backend may dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Shell,
    Info,
    Ping,
    Restart,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Shell => "shell",
            CommandKind::Info => "info",
            CommandKind::Ping => "ping",
            CommandKind::Restart => "restart",
        }
    }

    /// Parse a kind name as it appears in the config whitelist.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "shell" => Some(CommandKind::Shell),
            "info" => Some(CommandKind::Info),
            "ping" => Some(CommandKind::Ping),
            "restart" => Some(CommandKind::Restart),
            _ => None,
        }
    }

    pub fn all() -> [CommandKind; 4] {
        [CommandKind::Shell, CommandKind::Info, CommandKind::Ping, CommandKind::Restart]
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend-originated unit of work.
///
/// `timeout_s = 0` means "use the executor default".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    pub kind: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default)]
    pub timeout_s: u64,
}

/// Terminal outcome of a command execution.
///
/// `success` implies `error` is empty, and a zero exit code for kinds
/// that produce one. Executor-level rejections carry a negative
/// `exit_code` and never correspond to a spawned process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub id: String,
    pub success: bool,
    pub exit_code: i32,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: String,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl CommandResult {
    /// Shape a rejection: no process was spawned, `exit_code` is the
    /// rejection code, `output` is empty.
    pub fn rejected(id: &str, exit_code: i32, error: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            success: false,
            exit_code,
            output: String::new(),
            error: error.into(),
            duration_ms: 0,
            completed_at: Utc::now(),
        }
    }

    /// Shape a finished execution, stamped now. Success is derived:
    /// a zero exit code and no error message.
    pub fn finished(
        id: &str,
        exit_code: i32,
        output: String,
        error: String,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: id.to_string(),
            success: exit_code == 0 && error.is_empty(),
            exit_code,
            output,
            error,
            duration_ms,
            completed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
