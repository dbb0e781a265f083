// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types for both backend transports.
//!
//! DTOs serialized onto the request transport (register, heartbeat,
//! inventory, command results) and the duplex stream (`{type, data}`
//! frames), shared by the transport crate, the executor, and the daemon.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod command;
mod frame;
mod heartbeat;
mod inventory;

pub use command::{Command, CommandKind, CommandResult};
pub use frame::{
    command_result_frame, parse_inbound, pong_frame, FrameError, InboundFrame, TYPE_COMMAND,
    TYPE_COMMAND_RESULT, TYPE_PING, TYPE_PONG,
};
pub use heartbeat::{HeartbeatCounters, HeartbeatData};
pub use inventory::{
    DiskVolume, HardwareInfo, InstalledApp, Inventory, NetworkInfo, NetworkInterface,
    ProcessEntry, ServiceEntry, SoftwareInfo, SystemInfo,
};
