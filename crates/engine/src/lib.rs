// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command execution engine
//!
//! Admits, validates, runs, and shapes results of backend commands under
//! a concurrency ceiling. `Executor::execute` is total: every admitted
//! or rejected command produces exactly one `CommandResult`.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod executor;
mod sanitize;
mod subprocess;

pub use executor::{Executor, ExecutorConfig, ExecutorSnapshot};
pub use sanitize::{vet_shell_command, ShellRejection};
pub use subprocess::{run_with_timeout, RunError};
