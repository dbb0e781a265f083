// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine identity generation.

use uuid::Uuid;

/// Generate a fresh machine id for a first boot without a configured one.
///
/// The caller is responsible for persisting the id so it stays stable
/// across restarts.
pub fn generate_machine_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
#[path = "machine_id_tests.rs"]
mod tests;
