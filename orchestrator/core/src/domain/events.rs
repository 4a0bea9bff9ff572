// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Sandbox domain events fanned out by the event bus to UI and log-grep
//! observers.

use serde::{Deserialize, Serialize};

use crate::domain::status_summary::StatusSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SandboxEvent {
    /// Full status snapshot, published on any registry mutation.
    #[serde(rename = "sandbox-status-update")]
    SandboxStatusUpdate(StatusSummary),

    /// Per-MCP tool-cache delta.
    #[serde(rename = "tools-updated")]
    ToolsUpdated { mcp_server_id: String, message: String },

    /// Pass-through progress from an external model-download collaborator.
    #[serde(rename = "ollama-model-download-progress")]
    OllamaModelDownloadProgress {
        model: String,
        percentage: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}
