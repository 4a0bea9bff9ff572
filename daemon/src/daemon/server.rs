// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Daemon HTTP server wiring: configuration, the Sandbox Manager, the Axum
//! router, and graceful shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use mcp_sandbox_core::application::SandboxManager;
use mcp_sandbox_core::infrastructure::event_bus::SandboxEventBus;
use mcp_sandbox_core::infrastructure::persistence_memory::InMemoryInstalledMcpStore;
use mcp_sandbox_core::presentation::router;
use mcp_sandbox_core::SupervisorConfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::{remove_pid_file, write_pid_file};

pub async fn start_daemon(config_path: Option<PathBuf>, host: &str, port: u16) -> Result<()> {
    let pid = std::process::id();
    write_pid_file(pid)?;
    let _guard = PidFileGuard;

    info!(pid, "mcp-sandboxd starting");

    let config = Arc::new(SupervisorConfig::load_or_default(config_path.as_deref()).context("failed to load configuration")?);

    preflight_docker_check(config.docker_socket_path.as_deref()).await;

    if let Err(e) = PrometheusBuilder::new().with_http_listener(([0, 0, 0, 0], 9464)).install() {
        warn!(error = %e, "failed to install prometheus metrics exporter, continuing without it");
    }

    // Every installed MCP record ultimately comes from the relational store
    // the chat front-end owns (out of scope here); the in-memory adapter is
    // the reference implementation until that store is wired in.
    let persistence = Arc::new(InMemoryInstalledMcpStore::new());
    let events = Arc::new(SandboxEventBus::with_default_capacity());
    let manager = Arc::new(SandboxManager::new(config, persistence, events));

    if let Err(e) = manager.start().await {
        warn!(error = %e, "sandbox manager startup reported an error, serving anyway so /healthz reflects it");
    }

    let app = router(manager.clone());

    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("failed to bind to {addr}"))?;
    info!(%addr, "mcp-sandboxd listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("HTTP server failed")?;

    info!("mcp-sandboxd shutting down");
    manager.shutdown().await;

    Ok(())
}

/// A lightweight, independent Docker reachability check at startup,
/// separate from the Sandbox Manager's own runtime bring-up — surfaces a
/// clear warning early rather than waiting for the first MCP start attempt.
async fn preflight_docker_check(socket_path: Option<&str>) {
    let connect_result = match socket_path {
        Some(path) => bollard::Docker::connect_with_unix(path, 120, bollard::API_DEFAULT_VERSION),
        None => bollard::Docker::connect_with_local_defaults(),
    };

    match connect_result {
        Ok(docker) => match docker.ping().await {
            Ok(_) => info!("docker daemon reachable"),
            Err(e) => warn!(error = %e, "docker daemon not reachable at startup"),
        },
        Err(e) => warn!(error = %e, "failed to construct docker client"),
    }
}

struct PidFileGuard;

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        let _ = remove_pid_file();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate()).expect("failed to install SIGTERM handler").recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
