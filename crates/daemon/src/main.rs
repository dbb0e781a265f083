// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mmd` — the Machine Monitor agent daemon.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use mm_daemon::config::Config;
use mm_daemon::lifecycle::{respawn, Outcome, Supervisor};
use mm_daemon::{env, logging};

#[derive(Parser, Debug)]
#[command(name = "mmd", version, about = "Machine Monitor endpoint agent")]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level: debug, info, warning, error
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("mmd: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = match cli.config.or_else(env::config_path_override) {
        Some(path) => path,
        None => Config::default_path().context("resolving default config path")?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    // Precedence: flags, then environment, then the config file.
    let level = if cli.verbose {
        "debug".to_string()
    } else if let Some(level) = cli.log_level {
        level
    } else if let Some(level) = env::log_level_override() {
        level
    } else if env::debug_enabled() {
        "debug".to_string()
    } else {
        config.log_level.clone().unwrap_or_else(|| "info".to_string())
    };
    let _log_guard = logging::init(&level, config.log_file.as_deref());

    info!(version = env::AGENT_VERSION, config = %config_path.display(), "mmd starting");

    let supervisor = std::sync::Arc::new(Supervisor::new(config));
    let signal_target = std::sync::Arc::clone(&supervisor);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            signal_target.stop();
        }
    });

    match supervisor.run().await {
        Ok(Outcome::Stopped) => Ok(ExitCode::SUCCESS),
        Ok(Outcome::Restart) => {
            info!("respawning agent");
            if let Err(e) = respawn() {
                error!(error = %e, "respawn failed, staying down");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "agent exited with failure");
            Ok(ExitCode::from(1))
        }
    }
}
