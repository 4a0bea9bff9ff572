// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Error taxonomy for the MCP Sandbox Supervisor.
//!
//! Each infrastructure/application layer gets its own `thiserror` enum so
//! callers can match on cause without downcasting. `SupervisorError` is the
//! top-level union surfaced to the presentation layer and to
//! `on_startup_error`.

use thiserror::Error;

/// Runtime-bring-up failures. Fatal for the whole supervisor.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to connect to container runtime: {0}")]
    ConnectFailed(String),

    #[error("container runtime healthcheck failed: {0}")]
    HealthcheckFailed(String),

    #[error("failed to resolve runtime control socket path")]
    SocketUnresolved,

    #[error("failed to pull base image {image}: {reason}")]
    ImagePullFailed { image: String, reason: String },

    #[error("failed to stop container runtime: {0}")]
    StopFailed(String),

    #[error("failed to remove container runtime: {0}")]
    RemoveFailed(String),
}

/// Per-container lifecycle failures. Non-fatal globally.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("failed to build container spec: {0}")]
    SpecBuildFailed(String),

    #[error("failed to create container: {0}")]
    CreateFailed(String),

    #[error("failed to start container: {0}")]
    StartFailed(String),

    #[error("failed to stop container: {0}")]
    StopFailed(String),

    #[error("failed to remove container: {0}")]
    RemoveFailed(String),

    #[error("container did not become healthy within the poll budget")]
    HealthTimeout,

    #[error("failed to inspect container for assigned port: {0}")]
    PortDiscoveryFailed(String),

    #[error("host path {0} does not exist or is not a directory")]
    InvalidAllowedDirectory(String),

    #[error("docker-style command could not be parsed: {0}")]
    InvalidDockerCommand(String),
}

/// Multiplexer failures.
#[derive(Debug, Error)]
pub enum MultiplexError {
    #[error("transport closed or errored: {0}")]
    Transport(String),

    #[error("timed out waiting for MCP server response after 30s")]
    Timeout,

    #[error("non-notification request is missing a required `id` field")]
    MissingRequestId,

    #[error("malformed frame header")]
    MalformedFrame,

    #[error("failed to attach to container stream: {0}")]
    AttachFailed(String),
}

/// Remote connector failures.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("remote MCP connect failed after {attempts} attempts: {last_error}")]
    ConnectFailed { attempts: u32, last_error: String },

    #[error("remote MCP returned an error response: {0}")]
    RemoteError(String),

    #[error("remote MCP does not support streaming")]
    StreamingUnsupported,

    #[error("access token is missing or expired")]
    TokenUnavailable,
}

/// Wrapper start/stop failures.
#[derive(Debug, Error)]
pub enum WrapperError {
    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Multiplex(#[from] MultiplexError),

    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("OAuth is configured for this MCP but no access token is present")]
    MissingOAuthToken,

    #[error("readiness probe exhausted its attempt budget")]
    ReadinessTimeout,

    #[error("initial tools/list call failed: {0}")]
    ToolListFailed(String),
}

/// Supervisor-level failures.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Wrapper(#[from] WrapperError),

    #[error("no MCP registered under id {0}")]
    UnknownMcp(String),

    #[error("container name derived for MCP {mcp_id} collides with an already-registered MCP")]
    DuplicateContainerName { mcp_id: String },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Proxy target-resolution failures, raised before any response headers
/// are committed.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no MCP registered under id {0}")]
    UnknownMcp(String),

    #[error("MCP {0} is a streamable-HTTP server; connect to it directly instead of proxying")]
    DirectConnectRequired(String),
}

/// Persistence adapter failures.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("no installed MCP with id {0}")]
    NotFound(String),

    #[error("persistence backend error: {0}")]
    Backend(String),
}
