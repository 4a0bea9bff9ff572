// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `ToolDescriptor` and `ToolAnalysisRow`, and the composite tool id rules:
//! `<mcp_id>__<tool_name>` on the way in, "substring after the last `__`" on
//! the way back out to a cache key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Two-character separator used to compose a globally unique tool id from an
/// MCP id and a tool name local to that MCP. Chosen to be unambiguous within
/// the expected tool-name alphabet.
pub const COMPOSITE_ID_SEPARATOR: &str = "__";

/// Build the composite tool id `<mcp_id>__<tool_name>`.
pub fn composite_tool_id(mcp_id: &str, tool_name: &str) -> String {
    format!("{mcp_id}{COMPOSITE_ID_SEPARATOR}{tool_name}")
}

/// The tool-cache key: the substring after the *last* occurrence of the
/// composite separator, or the whole name if the separator is absent. A
/// flat tool name and a namespaced one that happens to end the same way
/// resolve to the same cache key by construction.
pub fn cache_key_for_tool_name(tool_name: &str) -> &str {
    match tool_name.rfind(COMPOSITE_ID_SEPARATOR) {
        Some(idx) => &tool_name[idx + COMPOSITE_ID_SEPARATOR.len()..],
        None => tool_name,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    AwaitingAnalysis,
    InProgress,
    Completed,
    Error,
}

/// Semantic classification of a tool, cached in-memory by the sandboxed
/// wrapper and persisted by an external analyzer collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolAnalysis {
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_write: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl Default for AnalysisStatus {
    fn default() -> Self {
        AnalysisStatus::AwaitingAnalysis
    }
}

impl ToolAnalysis {
    /// Derive status from a cached row: `completed` iff the row exists and
    /// has a non-null `analyzed_at`, else `awaiting_analysis`.
    pub fn from_cached_row(row: Option<&ToolAnalysisRow>) -> Self {
        match row {
            Some(row) if row.analyzed_at.is_some() => Self {
                status: AnalysisStatus::Completed,
                is_read: row.is_read,
                is_write: row.is_write,
                analyzed_at: row.analyzed_at,
            },
            Some(row) => Self {
                status: AnalysisStatus::AwaitingAnalysis,
                is_read: row.is_read,
                is_write: row.is_write,
                analyzed_at: None,
            },
            None => Self::default(),
        }
    }
}

/// Row persisted per `(mcp_id, tool_name)`, populated asynchronously by an
/// external analyzer collaborator; read-only from the Supervisor's view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolAnalysisRow {
    pub mcp_id: String,
    pub tool_name: String,
    pub is_read: Option<bool>,
    pub is_write: Option<bool>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

/// Tool metadata surfaced to the catalog layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub id: String,
    pub tool_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
    pub mcp_id: String,
    pub mcp_display_name: String,
    pub analysis: ToolAnalysis,
}

impl ToolDescriptor {
    pub fn new(
        mcp_id: &str,
        mcp_display_name: &str,
        tool_name: String,
        description: Option<String>,
        input_schema: Value,
        analysis: ToolAnalysis,
    ) -> Self {
        Self {
            id: composite_tool_id(mcp_id, &tool_name),
            tool_name,
            description,
            input_schema,
            mcp_id: mcp_id.to_string(),
            mcp_display_name: mcp_display_name.to_string(),
            analysis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_id_is_mcp_id_sep_tool_name() {
        assert_eq!(composite_tool_id("gmail", "send_email"), "gmail__send_email");
    }

    #[test]
    fn cache_key_uses_substring_after_last_separator() {
        assert_eq!(cache_key_for_tool_name("send_email"), "send_email");
        assert_eq!(cache_key_for_tool_name("namespace__send_email"), "send_email");
        assert_eq!(cache_key_for_tool_name("a__b__c"), "c");
    }

    #[test]
    fn flat_and_nested_names_agree_on_cache_key_rule() {
        // Boundary: "1 tool vs many tools prefix" must yield the same rule
        // for server-nested and flat tool names.
        let flat = cache_key_for_tool_name("search");
        let nested = cache_key_for_tool_name("gdrive__search");
        assert_eq!(flat, "search");
        assert_eq!(nested, "search");
    }

    #[test]
    fn analysis_status_derives_from_cached_row() {
        let row = ToolAnalysisRow {
            mcp_id: "gmail".into(),
            tool_name: "send_email".into(),
            is_read: Some(false),
            is_write: Some(true),
            analyzed_at: Some(Utc::now()),
        };
        let analysis = ToolAnalysis::from_cached_row(Some(&row));
        assert_eq!(analysis.status, AnalysisStatus::Completed);
        assert_eq!(analysis.is_write, Some(true));

        let unanalyzed_row = ToolAnalysisRow { analyzed_at: None, ..row };
        let analysis = ToolAnalysis::from_cached_row(Some(&unanalyzed_row));
        assert_eq!(analysis.status, AnalysisStatus::AwaitingAnalysis);

        let analysis = ToolAnalysis::from_cached_row(None);
        assert_eq!(analysis.status, AnalysisStatus::AwaitingAnalysis);
        assert!(analysis.is_read.is_none());
    }
}
