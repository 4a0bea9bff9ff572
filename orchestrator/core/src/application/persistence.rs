// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `InstalledMcpStore` — narrow persistence interface consumed by the
//! core. The concrete backend (a relational store, in deployments that
//! need durability across restarts) lives outside this crate entirely;
//! [`crate::infrastructure::persistence_memory::InMemoryInstalledMcpStore`]
//! is the reference implementation used by tests and standalone runs.

use async_trait::async_trait;

use crate::domain::errors::PersistenceError;
use crate::domain::installed_mcp::{InstalledMcp, OAuthTokens};
use crate::domain::tool::ToolAnalysisRow;

/// A single log record for an audited proxy request.
#[derive(Debug, Clone, serde::Serialize)]
pub struct McpRequestLogRecord {
    pub mcp_id: String,
    pub session_id: Option<String>,
    pub method: Option<String>,
    pub status: String,
    pub duration_ms: u128,
    pub response_body: Option<serde_json::Value>,
}

#[async_trait]
pub trait InstalledMcpStore: Send + Sync {
    async fn list_installed_mcps(&self) -> Result<Vec<InstalledMcp>, PersistenceError>;
    async fn get_mcp(&self, id: &str) -> Result<InstalledMcp, PersistenceError>;
    async fn update_mcp(&self, id: &str, patch: InstalledMcp) -> Result<(), PersistenceError>;
    async fn get_tool_analysis(&self, mcp_id: &str) -> Result<Vec<ToolAnalysisRow>, PersistenceError>;
    /// Enqueues analysis; does not block on completion.
    async fn save_tool_analysis_job(&self, tool_names: Vec<String>, mcp_id: &str) -> Result<(), PersistenceError>;
    async fn save_mcp_request_log(&self, record: McpRequestLogRecord) -> Result<(), PersistenceError>;
    async fn save_oauth_tokens(&self, mcp_id: &str, tokens: OAuthTokens) -> Result<(), PersistenceError>;
}
