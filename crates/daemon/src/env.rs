// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

/// Agent version (from Cargo.toml)
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file override: `AGENTE_CONFIG_PATH`
pub fn config_path_override() -> Option<PathBuf> {
    std::env::var("AGENTE_CONFIG_PATH").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// Log level override: `AGENTE_LOG_LEVEL`
pub fn log_level_override() -> Option<String> {
    std::env::var("AGENTE_LOG_LEVEL").ok().filter(|s| !s.is_empty())
}

/// Debug logging toggle: `AGENTE_DEBUG` set to `1` or `true`
pub fn debug_enabled() -> bool {
    matches!(
        std::env::var("AGENTE_DEBUG").ok().as_deref(),
        Some("1") | Some("true") | Some("TRUE")
    )
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
