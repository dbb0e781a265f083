// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System probing: inventory and health collection behind a pluggable
//! contract, with a TTL snapshot cache in front of the platform probe.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod cache;
mod probe;
mod sysinfo_probe;

pub use cache::Collector;
pub use probe::{ProbeError, SystemProbe};
pub use sysinfo_probe::SysinfoProbe;
