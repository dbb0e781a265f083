// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell command vetting.
//!
//! Substring scanning is defense in depth behind the kind whitelist:
//! coarse by design, it exists to stop the obvious chaining, redirection,
//! and privilege-escalation constructs before anything is spawned.

use thiserror::Error;

/// Substrings rejected in shell commands, matched against the lowercased
/// input.
const BANNED_SUBSTRINGS: &[&str] = &[
    ";", "&&", "||", "|", ">>", "<<", ">", "<", "`", "$(", " & ", "rm -rf", "del /f", "format",
    "sudo", "su ", "passwd", "chmod 777",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShellRejection {
    #[error("empty shell command")]
    Empty,

    #[error("dangerous shell construct `{0}` not permitted")]
    Banned(&'static str),
}

/// Vet a raw shell command. Returns the trimmed command when it passes.
pub fn vet_shell_command(raw: &str) -> Result<&str, ShellRejection> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ShellRejection::Empty);
    }
    let lowered = trimmed.to_lowercase();
    for banned in BANNED_SUBSTRINGS {
        if lowered.contains(banned) {
            return Err(ShellRejection::Banned(banned));
        }
    }
    Ok(trimmed)
}

#[cfg(test)]
#[path = "sanitize_tests.rs"]
mod tests;
