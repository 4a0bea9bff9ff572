// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Aggregates, value objects, and domain events for the MCP Sandbox
//! Supervisor's data model.

pub mod container_state;
pub mod errors;
pub mod events;
pub mod installed_mcp;
pub mod pending_request;
pub mod runtime_state;
pub mod status_summary;
pub mod tool;

pub use container_state::{ContainerLifecycleState, ContainerState};
pub use errors::{
    ConnectorError, ContainerError, MultiplexError, PersistenceError, ProxyError, RuntimeError,
    SupervisorError, WrapperError,
};
pub use events::SandboxEvent;
pub use installed_mcp::{InstalledMcp, McpType, OAuthTokens, ServerConfig};
pub use pending_request::{PendingOutcome, PendingRequest};
pub use runtime_state::{RuntimeState, RuntimeStatus};
pub use status_summary::{McpStatus, StatusSummary};
pub use tool::{
    cache_key_for_tool_name, composite_tool_id, AnalysisStatus, ToolAnalysis, ToolAnalysisRow,
    ToolDescriptor, COMPOSITE_ID_SEPARATOR,
};
