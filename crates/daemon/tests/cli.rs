// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binary surface checks for `mmd`.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use assert_cmd::Command;

#[test]
fn version_flag_prints_the_version() {
    let output = Command::cargo_bin("mmd").unwrap().arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn help_lists_the_flags() {
    let output = Command::cargo_bin("mmd").unwrap().arg("--help").output().unwrap();
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    assert!(text.contains("--config"));
    assert!(text.contains("--log-level"));
    assert!(text.contains("--verbose"));
}

#[test]
fn unreadable_config_exits_with_one() {
    let output = Command::cargo_bin("mmd")
        .unwrap()
        .args(["--config", "/nonexistent/mmd-config.json"])
        .env_remove("AGENTE_CONFIG_PATH")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("could not read config file"));
}

#[test]
fn invalid_config_exits_with_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{not json").unwrap();
    let output = Command::cargo_bin("mmd")
        .unwrap()
        .args(["--config", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}
