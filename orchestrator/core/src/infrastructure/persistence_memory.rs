// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `InMemoryInstalledMcpStore` — an `Arc<Mutex<HashMap>>` behind the trait,
//! suitable for tests and for standalone runs with no external relational
//! store configured.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::application::persistence::{InstalledMcpStore, McpRequestLogRecord};
use crate::domain::errors::PersistenceError;
use crate::domain::installed_mcp::{InstalledMcp, OAuthTokens};
use crate::domain::tool::ToolAnalysisRow;

#[derive(Default)]
pub struct InMemoryInstalledMcpStore {
    mcps: Mutex<HashMap<String, InstalledMcp>>,
    analysis: Mutex<HashMap<String, Vec<ToolAnalysisRow>>>,
}

impl InMemoryInstalledMcpStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, mcp: InstalledMcp) {
        self.mcps.lock().expect("lock poisoned").insert(mcp.id.clone(), mcp);
    }
}

#[async_trait]
impl InstalledMcpStore for InMemoryInstalledMcpStore {
    async fn list_installed_mcps(&self) -> Result<Vec<InstalledMcp>, PersistenceError> {
        Ok(self.mcps.lock().expect("lock poisoned").values().cloned().collect())
    }

    async fn get_mcp(&self, id: &str) -> Result<InstalledMcp, PersistenceError> {
        self.mcps
            .lock()
            .expect("lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }

    async fn update_mcp(&self, id: &str, patch: InstalledMcp) -> Result<(), PersistenceError> {
        let mut mcps = self.mcps.lock().expect("lock poisoned");
        if !mcps.contains_key(id) {
            return Err(PersistenceError::NotFound(id.to_string()));
        }
        mcps.insert(id.to_string(), patch);
        Ok(())
    }

    async fn get_tool_analysis(&self, mcp_id: &str) -> Result<Vec<ToolAnalysisRow>, PersistenceError> {
        Ok(self
            .analysis
            .lock()
            .expect("lock poisoned")
            .get(mcp_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_tool_analysis_job(&self, tool_names: Vec<String>, mcp_id: &str) -> Result<(), PersistenceError> {
        debug!(mcp_id, count = tool_names.len(), "enqueued tool analysis job (no-op analyzer in this reference store)");
        Ok(())
    }

    async fn save_mcp_request_log(&self, record: McpRequestLogRecord) -> Result<(), PersistenceError> {
        debug!(mcp_id = %record.mcp_id, status = %record.status, "mcp request log recorded");
        Ok(())
    }

    async fn save_oauth_tokens(&self, mcp_id: &str, tokens: OAuthTokens) -> Result<(), PersistenceError> {
        let mut mcps = self.mcps.lock().expect("lock poisoned");
        let mcp = mcps.get_mut(mcp_id).ok_or_else(|| PersistenceError::NotFound(mcp_id.to_string()))?;
        mcp.oauth_tokens = Some(tokens);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn sample_mcp(id: &str) -> InstalledMcp {
        InstalledMcp {
            id: id.to_string(),
            display_name: "Sample MCP".into(),
            mcp_type: crate::domain::installed_mcp::McpType::Local,
            server_config: crate::domain::installed_mcp::ServerConfig::default(),
            user_config: Map::new(),
            remote_url: None,
            oauth_tokens: None,
            oauth_config: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn get_mcp_returns_not_found_for_unknown_id() {
        let store = InMemoryInstalledMcpStore::new();
        let result = store.get_mcp("missing").await;
        assert!(matches!(result, Err(PersistenceError::NotFound(_))));
    }

    #[tokio::test]
    async fn save_oauth_tokens_updates_seeded_mcp() {
        let store = InMemoryInstalledMcpStore::new();
        store.seed(sample_mcp("gmail"));

        store
            .save_oauth_tokens(
                "gmail",
                OAuthTokens { access_token: "tok".into(), token_type: None, expires_in: None, issued_at: None },
            )
            .await
            .unwrap();

        let mcp = store.get_mcp("gmail").await.unwrap();
        assert_eq!(mcp.oauth_tokens.unwrap().access_token, "tok");
    }

    #[tokio::test]
    async fn list_installed_mcps_reflects_seeded_entries() {
        let store = InMemoryInstalledMcpStore::new();
        store.seed(sample_mcp("a"));
        store.seed(sample_mcp("b"));
        let all = store.list_installed_mcps().await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
