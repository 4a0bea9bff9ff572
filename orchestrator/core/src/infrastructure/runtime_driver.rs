// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `DockerRuntimeDriver` — brings the container runtime online, resolves
//! its control socket, and pulls the base image.

use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures::StreamExt;
use tracing::{info, warn};

use crate::domain::errors::RuntimeError;
use crate::domain::runtime_state::RuntimeState;

/// Bring-up driver for the local container runtime. Fail-fast: no retry
/// internally — the Sandbox Manager decides whether to retry a whole
/// `start()` cycle.
pub struct DockerRuntimeDriver {
    docker: Docker,
    socket_path: String,
}

impl DockerRuntimeDriver {
    /// Connect to the runtime's control socket, auto-detecting via local
    /// defaults unless `socket_path_override` names a specific path.
    pub fn connect(socket_path_override: Option<&str>) -> Result<Self, RuntimeError> {
        let docker = match socket_path_override {
            Some(path) => {
                #[cfg(unix)]
                let result = Docker::connect_with_unix(path, 120, bollard::API_DEFAULT_VERSION);
                #[cfg(windows)]
                let result =
                    Docker::connect_with_named_pipe(path, 120, bollard::API_DEFAULT_VERSION);
                result.map_err(|e| RuntimeError::ConnectFailed(e.to_string()))?
            }
            None => Docker::connect_with_local_defaults()
                .map_err(|e| RuntimeError::ConnectFailed(e.to_string()))?,
        };

        let socket_path = socket_path_override
            .map(|s| s.to_string())
            .unwrap_or_else(default_socket_path);

        Ok(Self { docker, socket_path })
    }

    pub fn docker(&self) -> &Docker {
        &self.docker
    }

    /// Verify the daemon answers `ping`, publishing progress into `state`
    /// along the way.
    pub async fn ensure_runtime_running(&self, state: &mut RuntimeState) -> Result<(), RuntimeError> {
        state.mark_initializing();
        state.mark_machine_progress(10, "connecting to container runtime");

        self.docker
            .ping()
            .await
            .map_err(|e| RuntimeError::HealthcheckFailed(e.to_string()))?;

        state.mark_machine_progress(100, "container runtime reachable");
        info!("container runtime reachable");
        Ok(())
    }

    pub fn resolve_socket_path(&self) -> Result<String, RuntimeError> {
        if self.socket_path.is_empty() {
            return Err(RuntimeError::SocketUnresolved);
        }
        Ok(self.socket_path.clone())
    }

    /// Pull the configured base image, publishing incremental progress
    /// into `state`.
    pub async fn pull_base_image(&self, image: &str, state: &mut RuntimeState) -> Result<(), RuntimeError> {
        if self.docker.inspect_image(image).await.is_ok() {
            state.mark_image_progress(100, "base image already present");
            return Ok(());
        }

        state.mark_image_progress(0, format!("pulling {image}"));
        let options = Some(CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        let mut last_percentage = 0u8;
        while let Some(update) = stream.next().await {
            let update = update.map_err(|e| RuntimeError::ImagePullFailed {
                image: image.to_string(),
                reason: e.to_string(),
            })?;

            if let (Some(current), Some(total)) = (
                update.progress_detail.as_ref().and_then(|d| d.current),
                update.progress_detail.as_ref().and_then(|d| d.total),
            ) {
                if total > 0 {
                    last_percentage = ((current as f64 / total as f64) * 100.0) as u8;
                    state.mark_image_progress(last_percentage, format!("pulling {image}"));
                }
            }
        }

        state.mark_image_progress(100, format!("pulled {image}"));
        info!(image, "base image pulled");
        Ok(())
    }

    pub async fn stop_runtime(&self) -> Result<(), RuntimeError> {
        warn!("stop_runtime is a no-op for an externally managed container runtime");
        Ok(())
    }

    pub async fn remove_runtime(&self, _force: bool) -> Result<(), RuntimeError> {
        warn!("remove_runtime is a no-op for an externally managed container runtime");
        Ok(())
    }
}

#[cfg(unix)]
fn default_socket_path() -> String {
    "/var/run/docker.sock".to_string()
}

#[cfg(not(unix))]
fn default_socket_path() -> String {
    r"\\.\pipe\docker_engine".to_string()
}
