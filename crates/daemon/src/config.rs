// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration: JSON file loading, defaults, and the generated
//! machine id.
//!
//! The file recognizes four sections (`agent`, `server`, `security`,
//! `logging`); anything omitted falls back to a default. The backend
//! base URL and api key are mandatory. A missing machine id is generated
//! once and written back to the file, the only state the agent persists.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mm_core::generate_machine_id;
use mm_wire::CommandKind;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_INVENTORY_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_READ_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing mandatory config field `{0}`")]
    MissingField(&'static str),

    #[error("could not determine default config path")]
    NoDefaultPath,

    #[error("could not persist generated machine id: {0}")]
    Persist(#[source] std::io::Error),
}

/// Raw file shape; every key optional so omissions fall back to defaults.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    agent: AgentSection,
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    security: SecuritySection,
    #[serde(default)]
    logging: LoggingSection,
}

#[derive(Debug, Default, Deserialize)]
struct AgentSection {
    machine_id: Option<String>,
    heartbeat_interval_s: Option<u64>,
    inventory_interval_s: Option<u64>,
    max_concurrency: Option<usize>,
    data_cache_ttl_s: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    base_url: Option<String>,
    timeout_s: Option<u64>,
    max_retries: Option<u32>,
    retry_delay_s: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SecuritySection {
    api_key: Option<String>,
    allowed_commands: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    file: Option<PathBuf>,
    max_size_mb: Option<u64>,
    max_age_days: Option<u64>,
}

/// Resolved configuration, immutable after load.
#[derive(Debug, Clone)]
pub struct Config {
    pub machine_id: String,
    pub base_url: String,
    pub api_key: String,

    pub heartbeat_interval: Duration,
    pub inventory_interval: Duration,
    pub cache_ttl: Duration,

    pub request_timeout: Duration,
    pub reconnect_interval: Duration,
    pub ping_interval: Duration,
    pub read_idle_timeout: Duration,
    pub write_timeout: Duration,

    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    pub backoff_jitter: bool,

    pub max_concurrency: usize,
    pub allowed_kinds: HashSet<CommandKind>,

    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub log_max_size_mb: Option<u64>,
    pub log_max_age_days: Option<u64>,
}

impl Config {
    /// Load and resolve the config file at `path`. Generates and
    /// persists a machine id when the file has none.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let file: ConfigFile = serde_json::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;

        let base_url = file
            .server
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or(ConfigError::MissingField("server.base_url"))?;
        let api_key = file
            .security
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or(ConfigError::MissingField("security.api_key"))?;

        let machine_id = match file.agent.machine_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = generate_machine_id();
                persist_machine_id(path, &raw, &id)?;
                id
            }
        };

        let allowed_kinds = match &file.security.allowed_commands {
            None => CommandKind::all().into_iter().collect(),
            Some(names) => {
                let mut kinds = HashSet::new();
                for name in names {
                    match CommandKind::from_name(name) {
                        Some(kind) => {
                            kinds.insert(kind);
                        }
                        None => warn!(%name, "ignoring unknown command kind in allowed_commands"),
                    }
                }
                kinds
            }
        };

        Ok(Self {
            machine_id,
            base_url,
            api_key,
            heartbeat_interval: file
                .agent
                .heartbeat_interval_s
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL),
            inventory_interval: file
                .agent
                .inventory_interval_s
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_INVENTORY_INTERVAL),
            cache_ttl: file
                .agent
                .data_cache_ttl_s
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CACHE_TTL),
            request_timeout: file
                .server
                .timeout_s
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            ping_interval: DEFAULT_PING_INTERVAL,
            read_idle_timeout: DEFAULT_READ_IDLE_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_retries: file.server.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            initial_backoff: file
                .server
                .retry_delay_s
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_INITIAL_BACKOFF),
            max_backoff: DEFAULT_MAX_BACKOFF,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            backoff_jitter: true,
            max_concurrency: file.agent.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY),
            allowed_kinds,
            log_level: file.logging.level,
            log_file: file.logging.file,
            log_max_size_mb: file.logging.max_size_mb,
            log_max_age_days: file.logging.max_age_days,
        })
    }

    /// Per-OS default config file location.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoDefaultPath)?;
        let dir = if cfg!(any(windows, target_os = "macos")) {
            "MachineMonitor"
        } else {
            "machine-monitor"
        };
        Ok(base.join(dir).join("config.json"))
    }
}

/// Write the generated machine id back into the config file, preserving
/// every other key (including ones this agent does not recognize).
fn persist_machine_id(path: &Path, raw: &str, id: &str) -> Result<(), ConfigError> {
    let mut value: serde_json::Value = serde_json::from_str(raw).unwrap_or_default();
    if !value.is_object() {
        value = serde_json::json!({});
    }
    if let Some(root) = value.as_object_mut() {
        let agent = root
            .entry("agent")
            .or_insert_with(|| serde_json::json!({}));
        if let Some(agent) = agent.as_object_mut() {
            agent.insert("machine_id".to_string(), serde_json::Value::String(id.to_string()));
        }
    }
    let pretty = serde_json::to_string_pretty(&value).unwrap_or_else(|_| raw.to_string());
    std::fs::write(path, pretty).map_err(ConfigError::Persist)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
