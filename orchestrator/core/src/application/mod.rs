// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application layer: use-cases orchestrating the domain and infrastructure
//! layers (the Sandboxed MCP Wrapper, the Sandbox Manager, and the
//! persistence port).

pub mod persistence;
pub mod sandbox_manager;
pub mod sandboxed_wrapper;

pub use persistence::{InstalledMcpStore, McpRequestLogRecord};
pub use sandbox_manager::SandboxManager;
pub use sandboxed_wrapper::SandboxedMcpWrapper;
