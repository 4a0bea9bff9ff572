// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `SandboxManager` — the process-wide singleton that brings up the
//! container runtime, fans out over every installed MCP, and exposes the
//! aggregate surfaces the proxy and UI observers read from.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::application::persistence::InstalledMcpStore;
use crate::application::sandboxed_wrapper::SandboxedMcpWrapper;
use crate::config::SupervisorConfig;
use crate::domain::errors::SupervisorError;
use crate::domain::events::SandboxEvent;
use crate::domain::installed_mcp::{InstalledMcp, McpType};
use crate::domain::runtime_state::RuntimeState;
use crate::domain::status_summary::StatusSummary;
use crate::domain::tool::ToolDescriptor;
use crate::infrastructure::event_bus::SandboxEventBus;
use crate::infrastructure::runtime_driver::DockerRuntimeDriver;

const RESTART_SETTLE_DELAY: Duration = Duration::from_secs(2);

pub struct SandboxManager {
    config: Arc<SupervisorConfig>,
    persistence: Arc<dyn InstalledMcpStore>,
    events: Arc<SandboxEventBus>,
    runtime_driver: RwLock<Option<DockerRuntimeDriver>>,
    runtime_state: RwLock<RuntimeState>,
    registry: RwLock<HashMap<String, Arc<SandboxedMcpWrapper>>>,
}

impl SandboxManager {
    pub fn new(config: Arc<SupervisorConfig>, persistence: Arc<dyn InstalledMcpStore>, events: Arc<SandboxEventBus>) -> Self {
        Self {
            config,
            persistence,
            events,
            runtime_driver: RwLock::new(None),
            runtime_state: RwLock::new(RuntimeState::default()),
            registry: RwLock::new(HashMap::new()),
        }
    }

    /// Bring up the runtime, then start every installed MCP in parallel.
    /// Always completes even with partial per-MCP failures; only a
    /// runtime-bring-up failure is fatal.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        {
            let mut state = self.runtime_state.write().await;
            state.mark_initializing();
        }
        self.publish_status().await;

        if let Err(e) = self.bring_up_runtime().await {
            let mut state = self.runtime_state.write().await;
            state.mark_error(e.to_string());
            drop(state);
            self.publish_status().await;
            return Err(e.into());
        }
        self.publish_status().await;

        let installed = self.persistence.list_installed_mcps().await?;
        let total = installed.len();
        let mut handles = Vec::with_capacity(total);
        for mcp in installed {
            handles.push(self.start_mcp(mcp));
        }

        let results = futures::future::join_all(handles).await;
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let failures = total - successes;
        info!(total, successes, failures, "sandbox manager startup complete");
        self.publish_status().await;
        Ok(())
    }

    async fn bring_up_runtime(&self) -> Result<(), crate::domain::errors::RuntimeError> {
        let driver = DockerRuntimeDriver::connect(self.config.docker_socket_path.as_deref())?;

        {
            let mut state = self.runtime_state.write().await;
            driver.ensure_runtime_running(&mut state).await?;
        }

        let socket_path = driver.resolve_socket_path()?;

        {
            let mut state = self.runtime_state.write().await;
            driver.pull_base_image(&self.config.base_docker_image, &mut state).await?;
            state.mark_running(socket_path);
        }

        *self.runtime_driver.write().await = Some(driver);
        Ok(())
    }

    pub async fn stop_all(&self) {
        let mut state = self.runtime_state.write().await;
        state.mark_stopping();
        drop(state);
        self.publish_status().await;

        let registry = self.registry.read().await;
        let stops = registry.values().map(|wrapper| wrapper.stop());
        futures::future::join_all(stops).await;
        drop(registry);

        if let Some(driver) = self.runtime_driver.write().await.take() {
            if let Err(e) = driver.stop_runtime().await {
                warn!(error = %e, "failed to stop container runtime");
            }
        }

        let mut state = self.runtime_state.write().await;
        state.mark_stopped();
        drop(state);
        self.publish_status().await;
    }

    /// Stop everything tolerating errors, settle, then run a fresh
    /// `start()` cycle.
    pub async fn restart(&self) -> Result<(), SupervisorError> {
        self.stop_all().await;
        self.registry.write().await.clear();
        tokio::time::sleep(RESTART_SETTLE_DELAY).await;
        self.start().await
    }

    /// Uninstall every MCP via persistence, clear the registry and runtime
    /// entirely, then `start()` again from scratch.
    pub async fn reset(&self) -> Result<(), SupervisorError> {
        let ids: Vec<String> = self.registry.read().await.keys().cloned().collect();
        for id in &ids {
            let _ = self.remove_mcp(id).await;
        }
        self.registry.write().await.clear();

        if let Some(driver) = self.runtime_driver.write().await.take() {
            if let Err(e) = driver.remove_runtime(true).await {
                warn!(error = %e, "failed to remove container runtime during reset");
            }
        }

        let mut state = self.runtime_state.write().await;
        state.mark_not_installed();
        drop(state);
        self.publish_status().await;

        self.start().await
    }

    /// The wrapper is inserted into the registry *before* its `start()`
    /// runs — the proxy looks wrappers up by id independently of their
    /// readiness state.
    pub async fn start_mcp(&self, installed: InstalledMcp) -> Result<(), SupervisorError> {
        let docker = {
            let driver = self.runtime_driver.read().await;
            driver.as_ref().ok_or(SupervisorError::Runtime(crate::domain::errors::RuntimeError::SocketUnresolved))?.docker().clone()
        };

        let wrapper = match installed.mcp_type {
            McpType::Local => {
                let container_name = installed.container_name(&self.config.container_name_prefix, &self.config.container_name_suffix);
                Arc::new(SandboxedMcpWrapper::new_local(
                    docker,
                    installed.id.clone(),
                    installed.display_name.clone(),
                    container_name,
                    &self.config,
                ))
            }
            McpType::Remote => Arc::new(SandboxedMcpWrapper::new_remote_pending(installed.id.clone(), installed.display_name.clone())),
        };

        self.registry.write().await.insert(installed.id.clone(), wrapper.clone());
        self.publish_status().await;

        let mcp_id = installed.id.clone();
        let result = wrapper.start(&installed, &self.config, self.persistence.clone(), self.events.clone()).await;
        if let Err(ref e) = result {
            error!(mcp_id = %mcp_id, error = %e, "mcp failed to start, remains in registry with error state");
        }
        self.publish_status().await;
        result.map_err(SupervisorError::from)
    }

    pub async fn stop_mcp(&self, id: &str) -> Result<(), SupervisorError> {
        let wrapper = self
            .registry
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SupervisorError::UnknownMcp(id.to_string()))?;
        wrapper.stop().await;
        self.publish_status().await;
        Ok(())
    }

    /// Stop, then drop from the registry.
    pub async fn remove_mcp(&self, id: &str) -> Result<(), SupervisorError> {
        self.stop_mcp(id).await?;
        self.registry.write().await.remove(id);
        self.publish_status().await;
        Ok(())
    }

    pub async fn get_all_tools(&self) -> HashMap<String, ToolDescriptor> {
        let registry = self.registry.read().await;
        let mut all = HashMap::new();
        for wrapper in registry.values() {
            for tool in wrapper.available_tools().await {
                all.insert(tool.id.clone(), tool);
            }
        }
        all
    }

    pub async fn get_tools_by_id(&self, ids: &[String]) -> HashMap<String, ToolDescriptor> {
        let all = self.get_all_tools().await;
        ids.iter().filter_map(|id| all.get(id).map(|tool| (id.clone(), tool.clone()))).collect()
    }

    pub async fn available_tools_list(&self) -> Vec<ToolDescriptor> {
        self.get_all_tools().await.into_values().collect()
    }

    pub async fn status_summary(&self) -> StatusSummary {
        let runtime = self.runtime_state.read().await.clone();
        let mut summary = StatusSummary::new(runtime);
        let registry = self.registry.read().await;
        for (id, wrapper) in registry.iter() {
            summary.mcps.insert(id.clone(), wrapper.status().await);
        }
        summary
    }

    /// Resolves the wrapper a proxy request should bridge to, before any
    /// response headers are committed. 404/400-class failures belong here,
    /// ahead of the point where the caller hijacks the response.
    pub async fn resolve_proxy_target(&self, id: &str) -> Result<Arc<SandboxedMcpWrapper>, crate::domain::errors::ProxyError> {
        use crate::domain::errors::ProxyError;

        let wrapper = self.registry.read().await.get(id).cloned().ok_or_else(|| ProxyError::UnknownMcp(id.to_string()))?;

        if wrapper.requires_direct_connect().await {
            return Err(ProxyError::DirectConnectRequired(id.to_string()));
        }

        Ok(wrapper)
    }

    /// Bridges an already-resolved proxy request to its MCP, recording an
    /// audit-log entry regardless of outcome. Called after the caller has
    /// committed to HTTP 200, so failures are folded into a JSON-RPC error
    /// envelope rather than returned as an `Err`: the header is already on
    /// the wire.
    pub async fn bridge_proxy_request(
        &self,
        wrapper: Arc<SandboxedMcpWrapper>,
        id: &str,
        request: serde_json::Value,
        session_id: Option<String>,
    ) -> serde_json::Value {
        use std::time::Instant;

        let original_id = request.get("id").cloned();
        let method = request.get("method").and_then(|v| v.as_str()).map(str::to_string);
        let started = Instant::now();
        let result = wrapper.stream_to_container(request).await;
        let duration_ms = started.elapsed().as_millis();

        let (status, response_body, value) = match result {
            Ok(value) => ("ok".to_string(), Some(value.clone()), value),
            Err(e) => {
                let error_value = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": original_id,
                    "error": { "code": -32603, "message": e.to_string() }
                });
                ("error".to_string(), Some(error_value.clone()), error_value)
            }
        };

        if let Err(e) = self
            .persistence
            .save_mcp_request_log(crate::application::persistence::McpRequestLogRecord {
                mcp_id: id.to_string(),
                session_id,
                method,
                status,
                duration_ms,
                response_body,
            })
            .await
        {
            warn!(mcp_id = %id, error = %e, "failed to persist proxy audit-log record");
        }

        value
    }

    /// `GET /mcp_proxy/{id}/logs` backing call.
    pub async fn mcp_logs(&self, id: &str, n_lines: usize) -> Result<(String, String), crate::domain::errors::ProxyError> {
        let wrapper = self
            .registry
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| crate::domain::errors::ProxyError::UnknownMcp(id.to_string()))?;
        wrapper
            .recent_logs(n_lines)
            .await
            .ok_or_else(|| crate::domain::errors::ProxyError::DirectConnectRequired(id.to_string()))
    }

    async fn publish_status(&self) {
        self.events.publish(SandboxEvent::SandboxStatusUpdate(self.status_summary().await));
    }

    /// Graceful shutdown ordering: cancel readiness probes and pending
    /// requests, close sockets, stop log pipes, stop containers, then stop
    /// the runtime. Each step is handled inside `SandboxedMcpWrapper::stop`;
    /// this just sequences the fan-out and the final runtime teardown.
    pub async fn shutdown(&self) {
        info!("sandbox manager shutting down");
        self.stop_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::installed_mcp::ServerConfig;
    use crate::infrastructure::persistence_memory::InMemoryInstalledMcpStore;
    use std::collections::HashMap as Map;

    fn sample_mcp(id: &str) -> InstalledMcp {
        InstalledMcp {
            id: id.to_string(),
            display_name: format!("MCP {id}"),
            mcp_type: McpType::Local,
            server_config: ServerConfig::default(),
            user_config: Map::new(),
            remote_url: None,
            oauth_tokens: None,
            oauth_config: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn status_summary_is_empty_before_any_mcp_starts() {
        let persistence = Arc::new(InMemoryInstalledMcpStore::new());
        let events = Arc::new(SandboxEventBus::with_default_capacity());
        let manager = SandboxManager::new(Arc::new(SupervisorConfig::default()), persistence, events);

        let summary = manager.status_summary().await;
        assert!(summary.mcps.is_empty());
        assert_eq!(summary.runtime.status, crate::domain::runtime_state::RuntimeStatus::NotInstalled);
    }

    #[tokio::test]
    async fn start_mcp_without_runtime_reports_socket_unresolved() {
        let persistence = Arc::new(InMemoryInstalledMcpStore::new());
        persistence.seed(sample_mcp("gmail"));
        let events = Arc::new(SandboxEventBus::with_default_capacity());
        let manager = SandboxManager::new(Arc::new(SupervisorConfig::default()), persistence, events);

        let result = manager.start_mcp(sample_mcp("gmail")).await;
        assert!(matches!(result, Err(SupervisorError::Runtime(_))));
    }

    #[tokio::test]
    async fn stop_mcp_for_unknown_id_is_an_error() {
        let persistence = Arc::new(InMemoryInstalledMcpStore::new());
        let events = Arc::new(SandboxEventBus::with_default_capacity());
        let manager = SandboxManager::new(Arc::new(SupervisorConfig::default()), persistence, events);

        let result = manager.stop_mcp("missing").await;
        assert!(matches!(result, Err(SupervisorError::UnknownMcp(_))));
    }
}
