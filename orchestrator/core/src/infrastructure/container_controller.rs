// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `ContainerController` — per-MCP container lifecycle against the
//! runtime's HTTP-over-Unix-socket API.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::service::{HostConfig, Mount, MountTypeEnum, PortBinding};
use bollard::Docker;
use tracing::{debug, error, warn};

use crate::config::SupervisorConfig;
use crate::domain::container_state::{ContainerLifecycleState, ContainerState};
use crate::domain::errors::ContainerError;
use crate::domain::installed_mcp::InstalledMcp;
use crate::infrastructure::docker_spec::{
    expand_allowed_directories, parse_docker_style_command, substitute_template,
};

/// Sanitize a basename to the alphanumerics/dot/dash/underscore alphabet
/// for use in bind-mount paths.
fn sanitize_basename(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}

struct ContainerSpec {
    image: String,
    cmd: Option<Vec<String>>,
    env: Vec<String>,
    binds: Vec<String>,
    port_bindings: HashMap<String, Option<Vec<PortBinding>>>,
    exposed_ports: HashMap<String, HashMap<(), ()>>,
}

/// Derive the container spec from an `InstalledMcp`: resolve the image and
/// command (unwrapping a `docker`/`podman` passthrough invocation if
/// present), substitute user-config templates, then build bind mounts for
/// file injections and allowed directories, and finally the port bindings
/// for a streamable-HTTP MCP. Writes file-injection payloads under
/// `temp_dir` as a side effect; the rest is pure.
fn build_container_spec(
    installed: &InstalledMcp,
    config: &SupervisorConfig,
    access_token: Option<&str>,
    temp_dir: &std::path::Path,
) -> Result<ContainerSpec, ContainerError> {
    let server_config = &installed.server_config;

    let (image, mut cmd, mut args, mut env_pairs) = if is_docker_wrapper(&server_config.command) {
        let parts = parse_docker_style_command(&server_config.args)
            .ok_or_else(|| ContainerError::InvalidDockerCommand(server_config.args.join(" ")))?;
        (parts.image, parts.command, parts.args, parts.env)
    } else {
        (
            config.base_docker_image.clone(),
            server_config.command.clone(),
            server_config.args.clone(),
            HashMap::new(),
        )
    };

    for (k, v) in &server_config.env {
        env_pairs.insert(k.clone(), v.clone());
    }

    // Template substitution over command, args, and env values (step 2).
    let user_config = &installed.user_config;
    cmd = cmd.map(|c| substitute_template(&c, user_config, access_token));
    args = args
        .iter()
        .map(|a| substitute_template(a, user_config, access_token))
        .collect();

    let allowed_directories: Vec<String> = user_config
        .get("allowed_directories")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    args = expand_allowed_directories(
        &args,
        &allowed_directories,
        &config.allowed_directories_mount_root,
        sanitize_basename,
    );

    for value in env_pairs.values_mut() {
        *value = substitute_template(value, user_config, access_token);
    }

    let mut binds = Vec::new();

    // Step 3a: file injections.
    if !server_config.file_injections.is_empty() {
        std::fs::create_dir_all(temp_dir)
            .map_err(|e| ContainerError::SpecBuildFailed(e.to_string()))?;
    }
    for (container_path, content) in &server_config.file_injections {
        let substituted = substitute_template(content, user_config, access_token);
        let basename = std::path::Path::new(container_path)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("injected-file");
        let host_path = temp_dir.join(format!("{}-{}", uuid::Uuid::new_v4(), basename));
        let mut file = std::fs::File::create(&host_path)
            .map_err(|e| ContainerError::SpecBuildFailed(e.to_string()))?;
        file.write_all(substituted.as_bytes())
            .map_err(|e| ContainerError::SpecBuildFailed(e.to_string()))?;

        let container_dest = if container_path.starts_with('/') {
            container_path.clone()
        } else {
            format!("/tmp/{container_path}")
        };
        binds.push(format!("{}:{}:ro", host_path.display(), container_dest));
    }

    // Step 3b: allowed_directories bind mounts.
    let read_only = user_config
        .get("read_only")
        .map(|v| v.as_bool().unwrap_or(false) || v.as_str() == Some("true"))
        .unwrap_or(false);
    for dir in &allowed_directories {
        let host_path = std::path::Path::new(dir);
        if !host_path.is_dir() {
            return Err(ContainerError::InvalidAllowedDirectory(dir.clone()));
        }
        let basename = host_path.file_name().and_then(|s| s.to_str()).unwrap_or(dir);
        let dest = format!("{}/{}", config.allowed_directories_mount_root, sanitize_basename(basename));
        let mode = if read_only { "ro" } else { "rw" };
        binds.push(format!("{}:{}:{}", host_path.display(), dest, mode));
    }

    // Step 4: port mapping for streamable-HTTP MCPs.
    let mut port_bindings = HashMap::new();
    let mut exposed_ports = HashMap::new();
    if let Some(container_port) = installed.streamable_http_port() {
        let key = format!("{container_port}/tcp");
        port_bindings.insert(
            key.clone(),
            Some(vec![PortBinding { host_ip: None, host_port: Some("0".to_string()) }]),
        );
        exposed_ports.insert(key, HashMap::new());
    }

    let env: Vec<String> = env_pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
    let full_cmd = cmd.map(|c| {
        let mut full = vec![c];
        full.extend(args);
        full
    });

    Ok(ContainerSpec {
        image,
        cmd: full_cmd,
        env,
        binds,
        port_bindings,
        exposed_ports,
    })
}

fn is_docker_wrapper(command: &Option<String>) -> bool {
    matches!(command.as_deref(), Some("docker") | Some("podman"))
}

pub struct ContainerController {
    docker: Docker,
    container_name: String,
    state: ContainerState,
}

impl ContainerController {
    pub fn new(docker: Docker, container_name: String) -> Self {
        Self {
            docker,
            state: ContainerState::not_created(container_name.clone()),
            container_name,
        }
    }

    pub fn state(&self) -> &ContainerState {
        &self.state
    }

    /// Idempotent across the three documented cases (already running,
    /// exists but stopped, doesn't exist yet), reporting progress at each
    /// startup waypoint.
    pub async fn start_or_create(
        &mut self,
        installed: &InstalledMcp,
        config: &SupervisorConfig,
        access_token: Option<&str>,
    ) -> Result<(), ContainerError> {
        let temp_dir = std::env::temp_dir().join(format!("mcp-sandbox-{}", self.container_name));
        let spec = build_container_spec(installed, config, access_token, &temp_dir)?;
        self.state.advance(ContainerLifecycleState::Initializing, 10, "container spec built");

        let inspect = self.docker.inspect_container(&self.container_name, None).await;

        match inspect {
            Ok(existing) => {
                let running = existing
                    .state
                    .as_ref()
                    .and_then(|s| s.running)
                    .unwrap_or(false);
                if running {
                    self.state.advance(ContainerLifecycleState::Running, 60, "already running");
                } else {
                    self.start_existing().await?;
                }
            }
            Err(_) => {
                self.create_and_start(spec).await?;
            }
        }

        self.state.advance(ContainerLifecycleState::Initializing, 80, "waiting for healthy");
        if !self.wait_healthy().await {
            self.state.mark_error("container did not become healthy within the poll budget");
            return Err(ContainerError::HealthTimeout);
        }

        self.state.advance(ContainerLifecycleState::Initializing, 90, "attach stream ready");
        self.state.mark_running();
        Ok(())
    }

    async fn create_and_start(&mut self, spec: ContainerSpec) -> Result<(), ContainerError> {
        let host_config = HostConfig {
            binds: Some(spec.binds),
            port_bindings: Some(spec.port_bindings),
            mounts: Some(Vec::<Mount>::new()),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image),
            cmd: spec.cmd,
            env: Some(spec.env),
            open_stdin: Some(true),
            tty: Some(false),
            host_config: Some(host_config),
            exposed_ports: Some(spec.exposed_ports),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: self.container_name.clone(),
            platform: None,
        };

        self.docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| ContainerError::CreateFailed(e.to_string()))?;
        self.state.advance(ContainerLifecycleState::Created, 30, "created");

        self.start_existing().await
    }

    async fn start_existing(&mut self) -> Result<(), ContainerError> {
        let result = self
            .docker
            .start_container(&self.container_name, None::<StartContainerOptions<String>>)
            .await;

        match result {
            Ok(()) => {
                self.state.advance(ContainerLifecycleState::Initializing, 60, "start acknowledged");
                Ok(())
            }
            Err(e) if e.to_string().contains("304") => {
                // "not modified" - already running.
                self.state.advance(ContainerLifecycleState::Running, 60, "already running");
                Ok(())
            }
            Err(e) => {
                self.state.mark_error(e.to_string());
                let cleanup = self.remove(true).await;
                if let Err(cleanup_err) = cleanup {
                    warn!(error = %cleanup_err, "cleanup after failed start also failed");
                }
                Err(ContainerError::StartFailed(e.to_string()))
            }
        }
    }

    /// Tolerates "already stopped" and "not found".
    pub async fn stop(&mut self) -> Result<(), ContainerError> {
        self.state.advance(ContainerLifecycleState::Stopping, self.state.startup_percentage, "stopping");
        let result = self
            .docker
            .stop_container(&self.container_name, Some(StopContainerOptions { t: 10 }))
            .await;

        match result {
            Ok(()) => {}
            Err(e) if is_already_stopped_or_missing(&e) => {
                debug!(container = %self.container_name, "stop: already stopped or not found");
            }
            Err(e) => return Err(ContainerError::StopFailed(e.to_string())),
        }

        self.state.advance(ContainerLifecycleState::Stopped, 0, "stopped");
        Ok(())
    }

    /// Stop if running, delete container and volumes. Log/rotation cleanup
    /// is the caller's responsibility via the Log Pipe's own `cleanup()`.
    pub async fn remove(&mut self, force: bool) -> Result<(), ContainerError> {
        let result = self
            .docker
            .remove_container(
                &self.container_name,
                Some(RemoveContainerOptions { force, v: true, ..Default::default() }),
            )
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(e) if is_already_stopped_or_missing(&e) => Ok(()),
            Err(e) => {
                error!(container = %self.container_name, error = %e, "failed to remove container");
                Err(ContainerError::RemoveFailed(e.to_string()))
            }
        }
    }

    /// Poll the runtime's inspect endpoint for a running state with a short
    /// interval, bounded attempt budget.
    pub async fn wait_healthy(&self) -> bool {
        for _ in 0..30 {
            if let Ok(inspect) = self.docker.inspect_container(&self.container_name, None).await {
                let running = inspect.state.as_ref().and_then(|s| s.running).unwrap_or(false);
                if running {
                    return true;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        }
        false
    }

    /// Read back the host port Docker assigned for a streamable-HTTP MCP's
    /// exposed container port.
    pub async fn discover_assigned_port(&mut self, container_port: u16) -> Result<(), ContainerError> {
        let inspect = self
            .docker
            .inspect_container(&self.container_name, None)
            .await
            .map_err(|e| ContainerError::PortDiscoveryFailed(e.to_string()))?;

        let key = format!("{container_port}/tcp");
        let port = inspect
            .network_settings
            .as_ref()
            .and_then(|ns| ns.ports.as_ref())
            .and_then(|ports| ports.get(&key))
            .and_then(|bindings| bindings.as_ref())
            .and_then(|bindings| bindings.first())
            .and_then(|binding| binding.host_port.as_ref())
            .and_then(|p| p.parse::<u16>().ok())
            .ok_or_else(|| ContainerError::PortDiscoveryFailed(format!("no host port bound for {key}")))?;

        self.state.mark_port(port);
        Ok(())
    }
}

fn is_already_stopped_or_missing(err: &bollard::errors::Error) -> bool {
    let text = err.to_string();
    text.contains("304") || text.contains("404") || text.contains("is not running")
}

/// Temp directory root used for per-container file injections.
pub fn file_injection_temp_root(container_name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("mcp-sandbox-{container_name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    #[test]
    fn sanitize_basename_strips_disallowed_characters() {
        assert_eq!(sanitize_basename("my project!"), "my_project_");
        assert_eq!(sanitize_basename("notes-v2.final"), "notes-v2.final");
    }

    #[test]
    fn is_docker_wrapper_recognizes_docker_and_podman() {
        assert!(is_docker_wrapper(&Some("docker".to_string())));
        assert!(is_docker_wrapper(&Some("podman".to_string())));
        assert!(!is_docker_wrapper(&Some("python".to_string())));
        assert!(!is_docker_wrapper(&None));
    }

    #[test]
    fn build_container_spec_uses_default_image_for_non_docker_command() {
        let installed = InstalledMcp {
            id: "fs".into(),
            display_name: "Filesystem".into(),
            mcp_type: crate::domain::installed_mcp::McpType::Local,
            server_config: crate::domain::installed_mcp::ServerConfig {
                command: Some("python".into()),
                args: vec!["-m".into(), "server".into()],
                env: Map::new(),
                file_injections: Map::new(),
            },
            user_config: Map::new(),
            remote_url: None,
            oauth_tokens: None,
            oauth_config: None,
            created_at: chrono::Utc::now(),
        };
        let config = SupervisorConfig::default();
        let temp_dir = std::env::temp_dir().join("mcp-sandbox-test-spec");
        let spec = build_container_spec(&installed, &config, None, &temp_dir).unwrap();
        assert_eq!(spec.image, config.base_docker_image);
        assert_eq!(spec.cmd, Some(vec!["python".to_string(), "-m".to_string(), "server".to_string()]));
    }
}
