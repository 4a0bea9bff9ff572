// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # mcp-sandbox-core
//!
//! Container lifecycle, stdio multiplexing, and tool catalog core for the
//! 100monkeys.ai desktop orchestrator's MCP Sandbox Supervisor.
//!
//! ## Components
//!
//! | Component | Module | Responsibility |
//! |---|---|---|
//! | Runtime Driver | [`infrastructure::runtime_driver`] | bring up the container runtime, pull the base image |
//! | Container Controller | [`infrastructure::container_controller`] | per-MCP container spec derivation and lifecycle |
//! | Stdio Multiplexer | [`infrastructure::stdio_multiplexer`] | JSON-RPC request/response correlation over an attach stream |
//! | Log Pipe | [`infrastructure::log_pipe`] | rotating per-container log capture |
//! | Remote Connector | [`infrastructure::remote_connector`] | bearer-token HTTP transport to a remote MCP |
//! | Sandboxed Wrapper | [`application::sandboxed_wrapper`] | unifies local/remote MCPs, owns the tool cache |
//! | Sandbox Manager | [`application::sandbox_manager`] | process-wide singleton, registry, fan-out start/stop |
//! | Proxy Endpoint | [`presentation::proxy`] | HTTP bridge from external callers to a specific MCP |
//! | Event Bus | [`infrastructure::event_bus`] | fan-out of status diffs to observers |
//! | Persistence Adapter | [`application::persistence`] | narrow interface to the installed-MCP store |
//!
//! ## Layer Structure
//!
//! ```text
//! presentation/   ← HTTP API (axum)
//!     ↓
//! application/    ← SandboxedMcpWrapper, SandboxManager, persistence port
//!     ↓
//! domain/         ← InstalledMcp, ContainerState, RuntimeState, ToolDescriptor, events
//!     ↓
//! infrastructure/ ← Docker runtime, stdio multiplexing, log rotation, remote HTTP transport
//! ```

pub mod config;
pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use config::SupervisorConfig;
pub use domain::*;
