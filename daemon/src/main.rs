// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `mcp-sandboxd` — the MCP Sandbox Supervisor daemon.
//!
//! Runs in the foreground by default (the expected mode under a process
//! supervisor or a container `CMD`); `stop`/`status` subcommands operate
//! against a running instance via its PID file and `/healthz` endpoint.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

mod daemon;

/// MCP Sandbox Supervisor daemon
#[derive(Parser)]
#[command(name = "mcp-sandboxd")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a SupervisorConfig YAML file (overrides defaults)
    #[arg(short, long, global = true, env = "MCP_SANDBOXD_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// HTTP API port
    #[arg(long, global = true, env = "MCP_SANDBOXD_PORT", default_value = "8080")]
    port: u16,

    /// HTTP API bind host
    #[arg(long, global = true, env = "MCP_SANDBOXD_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "MCP_SANDBOXD_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a daemon instance is running and healthy
    Status,
    /// Stop a running daemon instance
    Stop {
        /// Escalate to SIGKILL if graceful shutdown doesn't complete in time
        #[arg(long)]
        force: bool,
        #[arg(long, default_value = "10")]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Status) => match daemon::check_daemon_running(&cli.host, cli.port).await? {
            daemon::DaemonStatus::Running { pid, .. } => {
                println!("running (pid {pid})");
                Ok(())
            }
            daemon::DaemonStatus::Unhealthy { pid, error } => {
                println!("unhealthy (pid {pid}): {error}");
                std::process::exit(1);
            }
            daemon::DaemonStatus::Stopped => {
                println!("stopped");
                std::process::exit(1);
            }
        },
        Some(Commands::Stop { force, timeout_secs }) => daemon::stop_daemon(force, timeout_secs).await,
        None => {
            info!("starting mcp-sandboxd");
            daemon::start_daemon(cli.config, &cli.host, cli.port).await
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("failed to build log filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();

    Ok(())
}
