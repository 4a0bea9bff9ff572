// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `SandboxedMcpWrapper` — unifies local and remote MCPs behind one
//! surface; owns the tool cache and its coherence poller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bollard::Docker;
use dashmap::DashMap;
use rand::Rng;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};

use crate::application::persistence::InstalledMcpStore;
use crate::config::SupervisorConfig;
use crate::domain::errors::WrapperError;
use crate::domain::installed_mcp::{InstalledMcp, McpType};
use crate::domain::status_summary::McpStatus;
use crate::domain::tool::{cache_key_for_tool_name, AnalysisStatus, ToolAnalysis, ToolDescriptor};
use crate::infrastructure::container_controller::ContainerController;
use crate::infrastructure::event_bus::SandboxEventBus;
use crate::infrastructure::log_pipe::LogPipe;
use crate::infrastructure::remote_connector::RemoteMcpConnector;
use crate::infrastructure::stdio_multiplexer::StdioMultiplexer;
use crate::domain::events::SandboxEvent;

const READINESS_MAX_ATTEMPTS: u32 = 30;
const READINESS_BASE_INTERVAL_MS: u64 = 1000;
const READINESS_BACKOFF_MULTIPLIER: f64 = 1.2;
const READINESS_MAX_INTERVAL_MS: u64 = 5000;
const READINESS_JITTER_MS: i64 = 200;
const ANALYSIS_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
/// Docker publishes container ports onto every host interface; the
/// supervisor always dials back in over loopback.
const LOCAL_STREAMABLE_HTTP_HOST: &str = "127.0.0.1";

enum Transport {
    Local {
        controller: ContainerController,
        multiplexer: StdioMultiplexer,
        log_pipe: LogPipe,
        /// Set once the container's streamable-HTTP port has been
        /// discovered and pinged healthy; tool traffic then goes over this
        /// client instead of the stdio multiplexer.
        http_client: Option<RemoteMcpConnector>,
    },
    Remote {
        connector: RemoteMcpConnector,
    },
}

/// Per-tool semantic flags cached by name only, keyed via
/// [`cache_key_for_tool_name`].
type ToolCache = DashMap<String, ToolAnalysis>;

pub struct SandboxedMcpWrapper {
    mcp_id: String,
    display_name: String,
    transport: RwLock<Transport>,
    tool_cache: Arc<ToolCache>,
    tools: RwLock<Vec<ToolDescriptor>>,
    analysis_task: RwLock<Option<JoinHandle<()>>>,
    last_error: RwLock<Option<String>>,
}

impl SandboxedMcpWrapper {
    pub fn new_local(docker: Docker, mcp_id: String, display_name: String, container_name: String, config: &SupervisorConfig) -> Self {
        let controller = ContainerController::new(docker.clone(), container_name.clone());
        let multiplexer = StdioMultiplexer::new(docker.clone(), container_name.clone());
        let log_pipe = LogPipe::new(docker, container_name, config);
        Self {
            mcp_id,
            display_name,
            transport: RwLock::new(Transport::Local { controller, multiplexer, log_pipe, http_client: None }),
            tool_cache: Arc::new(DashMap::new()),
            tools: RwLock::new(Vec::new()),
            analysis_task: RwLock::new(None),
            last_error: RwLock::new(None),
        }
    }

    /// Registers a remote wrapper with a [`RemoteMcpConnector::placeholder`]
    /// transport so it can be placed in the registry ahead of `start()`,
    /// which dials out and swaps in a real connector.
    pub fn new_remote_pending(mcp_id: String, display_name: String) -> Self {
        Self {
            mcp_id,
            display_name,
            transport: RwLock::new(Transport::Remote { connector: RemoteMcpConnector::placeholder() }),
            tool_cache: Arc::new(DashMap::new()),
            tools: RwLock::new(Vec::new()),
            analysis_task: RwLock::new(None),
            last_error: RwLock::new(None),
        }
    }

    pub fn mcp_id(&self) -> &str {
        &self.mcp_id
    }

    pub async fn start(
        &self,
        installed: &InstalledMcp,
        config: &SupervisorConfig,
        persistence: Arc<dyn InstalledMcpStore>,
        events: Arc<SandboxEventBus>,
    ) -> Result<(), WrapperError> {
        let span = info_span!("mcp", id = %self.mcp_id);
        let result = async {
            self.hydrate_cache_from_persistence(&persistence).await;

            let access_token = installed.oauth_tokens.as_ref().map(|t| t.access_token.as_str());
            if installed.oauth_config.is_some() && access_token.is_none() {
                return Err(WrapperError::MissingOAuthToken);
            }

            match installed.mcp_type {
                McpType::Local => self.start_local(installed, config, access_token).await?,
                McpType::Remote => self.start_remote(installed).await?,
            }

            self.wait_for_readiness().await?;
            self.refresh_tools(installed).await?;
            self.spawn_analysis_poller(persistence, events).await;
            info!(mcp_id = %self.mcp_id, "mcp wrapper started");
            Ok(())
        }
        .instrument(span)
        .await;

        *self.last_error.write().await = result.as_ref().err().map(|e| e.to_string());
        result
    }

    async fn start_local(&self, installed: &InstalledMcp, config: &SupervisorConfig, access_token: Option<&str>) -> Result<(), WrapperError> {
        let mut transport = self.transport.write().await;
        let Transport::Local { controller, log_pipe, http_client, .. } = &mut *transport else {
            return Ok(());
        };

        if let Err(e) = controller.start_or_create(installed, config, access_token).await {
            error!(mcp_id = %self.mcp_id, error = %e, "container failed to start, cleaning up");
            let _ = controller.remove(true).await;
            return Err(e.into());
        }

        if let Some(container_port) = installed.streamable_http_port() {
            if let Err(e) = controller.discover_assigned_port(container_port).await {
                error!(mcp_id = %self.mcp_id, error = %e, "container failed to start, cleaning up");
                let _ = controller.remove(true).await;
                return Err(e.into());
            }

            let assigned_port = controller.state().assigned_host_port.ok_or(WrapperError::ReadinessTimeout)?;
            let url = installed.streamable_http_url(LOCAL_STREAMABLE_HTTP_HOST, assigned_port);
            match RemoteMcpConnector::connect_local(&url).await {
                Ok(connector) => *http_client = Some(connector),
                Err(e) => {
                    error!(mcp_id = %self.mcp_id, error = %e, "container failed to start, cleaning up");
                    let _ = controller.remove(true).await;
                    return Err(e.into());
                }
            }
        }

        log_pipe.start_streaming();
        Ok(())
    }

    async fn start_remote(&self, installed: &InstalledMcp) -> Result<(), WrapperError> {
        let tokens = installed
            .oauth_tokens
            .as_ref()
            .ok_or(WrapperError::MissingOAuthToken)?;
        let url = installed
            .remote_url
            .as_deref()
            .ok_or_else(|| WrapperError::ToolListFailed("remote MCP has no configured URL".into()))?;

        let connector = RemoteMcpConnector::connect(url, tokens)
            .await
            .map_err(WrapperError::from)?;
        *self.transport.write().await = Transport::Remote { connector };
        Ok(())
    }

    /// Readiness probe: `tools/list` every ~1s up to 30 attempts, backoff
    /// multiplier 1.2 with ±200ms jitter, capped at 5s.
    async fn wait_for_readiness(&self) -> Result<(), WrapperError> {
        let mut interval_ms = READINESS_BASE_INTERVAL_MS as f64;
        for attempt in 0..READINESS_MAX_ATTEMPTS {
            if self.probe_tools_list().await.is_ok() {
                return Ok(());
            }

            if attempt + 1 == READINESS_MAX_ATTEMPTS {
                break;
            }

            let jitter: i64 = rand::thread_rng().gen_range(-READINESS_JITTER_MS..=READINESS_JITTER_MS);
            let sleep_ms = (interval_ms as i64 + jitter).max(0) as u64;
            tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
            interval_ms = (interval_ms * READINESS_BACKOFF_MULTIPLIER).min(READINESS_MAX_INTERVAL_MS as f64);
        }

        warn!(mcp_id = %self.mcp_id, "readiness probe exhausted its attempt budget");
        Err(WrapperError::ReadinessTimeout)
    }

    async fn probe_tools_list(&self) -> Result<Value, WrapperError> {
        let transport = self.transport.read().await;
        match &*transport {
            Transport::Local { http_client: Some(http_client), .. } => {
                http_client.list_tools().await.map_err(WrapperError::from)
            }
            Transport::Local { multiplexer, .. } => multiplexer
                .send_request(serde_json::json!({ "jsonrpc": "2.0", "id": "tools-list", "method": "tools/list" }))
                .await
                .map_err(WrapperError::from),
            Transport::Remote { connector } => connector.list_tools().await.map_err(WrapperError::from),
        }
    }

    async fn refresh_tools(&self, installed: &InstalledMcp) -> Result<(), WrapperError> {
        let response = self
            .probe_tools_list()
            .await
            .map_err(|e| WrapperError::ToolListFailed(e.to_string()))?;

        let raw_tools = response
            .get("result")
            .and_then(|r| r.get("tools"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut descriptors = Vec::with_capacity(raw_tools.len());
        for raw in raw_tools {
            let tool_name = raw.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            let cache_key = cache_key_for_tool_name(&tool_name).to_string();
            let analysis = self
                .tool_cache
                .get(&cache_key)
                .map(|entry| entry.clone())
                .unwrap_or_default();

            descriptors.push(ToolDescriptor::new(
                &self.mcp_id,
                &self.display_name,
                tool_name,
                raw.get("description").and_then(Value::as_str).map(str::to_string),
                raw.get("inputSchema").cloned().unwrap_or(Value::Object(Default::default())),
                analysis,
            ));
        }

        let _ = installed;
        *self.tools.write().await = descriptors;
        Ok(())
    }

    /// Tool-cache coherence poller: on start, then every 5s, query
    /// persistence for the latest analysis rows and publish
    /// `tools-updated` when anything changed.
    async fn spawn_analysis_poller(&self, persistence: Arc<dyn InstalledMcpStore>, events: Arc<SandboxEventBus>) {
        let mcp_id = self.mcp_id.clone();
        let tool_cache = self.tool_cache.clone();

        let handle = tokio::spawn(async move {
            loop {
                match persistence.get_tool_analysis(&mcp_id).await {
                    Ok(rows) => {
                        let mut changed = false;
                        for row in &rows {
                            let new_value = ToolAnalysis::from_cached_row(Some(row));
                            let differs = tool_cache
                                .get(&row.tool_name)
                                .map(|existing| !analysis_equal(&existing, &new_value))
                                .unwrap_or(true);
                            if differs {
                                tool_cache.insert(row.tool_name.clone(), new_value);
                                changed = true;
                            }
                        }
                        if changed {
                            events.publish(SandboxEvent::ToolsUpdated {
                                mcp_server_id: mcp_id.clone(),
                                message: format!("{} tools updated", rows.len()),
                            });
                        }
                    }
                    Err(e) => {
                        // Analysis-refresh errors are logged and swallowed.
                        warn!(mcp_id = %mcp_id, error = %e, "analysis refresh failed, keeping cached values");
                    }
                }
                tokio::time::sleep(ANALYSIS_REFRESH_INTERVAL).await;
            }
        });

        *self.analysis_task.write().await = Some(handle);
    }

    async fn hydrate_cache_from_persistence(&self, persistence: &Arc<dyn InstalledMcpStore>) {
        if let Ok(rows) = persistence.get_tool_analysis(&self.mcp_id).await {
            for row in rows {
                let value = ToolAnalysis::from_cached_row(Some(&row));
                self.tool_cache.insert(row.tool_name, value);
            }
        }
    }

    pub async fn stop(&self) {
        if let Some(task) = self.analysis_task.write().await.take() {
            task.abort();
        }

        let mut transport = self.transport.write().await;
        if let Transport::Local { controller, multiplexer, log_pipe, http_client } = &mut *transport {
            multiplexer.close().await;
            if let Some(http_client) = http_client.take() {
                http_client.close();
            }
            log_pipe.stop_streaming();
            if let Err(e) = controller.stop().await {
                warn!(mcp_id = %self.mcp_id, error = %e, "failed to stop container during wrapper stop");
            }
        }
    }

    /// Local only.
    pub async fn stream_to_container(&self, request: Value) -> Result<Value, WrapperError> {
        let transport = self.transport.read().await;
        match &*transport {
            Transport::Local { multiplexer, .. } => multiplexer.send_request(request).await.map_err(WrapperError::from),
            Transport::Remote { .. } => Err(WrapperError::ToolListFailed(
                "streaming not supported for remote MCPs".into(),
            )),
        }
    }

    /// True for remote MCPs and for local streamable-HTTP MCPs, both of
    /// which the proxy endpoint refuses to bridge: callers connect to them
    /// directly instead.
    pub async fn requires_direct_connect(&self) -> bool {
        match &*self.transport.read().await {
            Transport::Local { http_client, .. } => http_client.is_some(),
            Transport::Remote { .. } => true,
        }
    }

    pub async fn available_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.read().await.clone()
    }

    /// `GET /mcp_proxy/{id}/logs` backing call: `None` for remote MCPs,
    /// which have no local log pipe.
    pub async fn recent_logs(&self, n_lines: usize) -> Option<(String, String)> {
        let transport = self.transport.read().await;
        match &*transport {
            Transport::Local { log_pipe, controller, .. } => {
                Some((log_pipe.get_recent(n_lines), controller.state().container_name.clone()))
            }
            Transport::Remote { .. } => None,
        }
    }

    pub async fn status(&self) -> McpStatus {
        let transport = self.transport.read().await;
        let container = match &*transport {
            Transport::Local { controller, .. } => controller.state().clone(),
            Transport::Remote { .. } => match self.last_error.read().await.clone() {
                Some(error) => crate::domain::container_state::ContainerState {
                    state: crate::domain::container_state::ContainerLifecycleState::Error,
                    startup_percentage: 0,
                    message: None,
                    error: Some(error),
                    assigned_host_port: None,
                    container_name: self.display_name.clone(),
                },
                None => crate::domain::container_state::ContainerState {
                    state: crate::domain::container_state::ContainerLifecycleState::Running,
                    startup_percentage: 100,
                    message: Some("remote MCP".into()),
                    error: None,
                    assigned_host_port: None,
                    container_name: self.display_name.clone(),
                },
            },
        };
        McpStatus { container, tools: self.tools.read().await.clone() }
    }
}


fn analysis_equal(a: &ToolAnalysis, b: &ToolAnalysis) -> bool {
    a.status == b.status && a.is_read == b.is_read && a.is_write == b.is_write && a.analyzed_at == b.analyzed_at
}
