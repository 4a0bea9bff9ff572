// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `SupervisorConfig` — the recognized configuration surface, loaded once at
//! daemon startup and threaded through as an `Arc<SupervisorConfig>`.
//! YAML file with environment-variable overrides, defaults if missing.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

fn default_base_image() -> String {
    "ghcr.io/archestra-ai/mcp-base:latest".to_string()
}

fn default_log_max_size() -> String {
    "5M".to_string()
}

fn default_log_max_files() -> u32 {
    2
}

fn default_container_name_prefix() -> String {
    "archestra-mcp-".to_string()
}

fn default_container_name_suffix() -> String {
    "-sandbox".to_string()
}

fn default_mount_root() -> String {
    "/mnt/archestra".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/archestra/mcp")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// `MCP_BASE_DOCKER_IMAGE` override.
    #[serde(default = "default_base_image")]
    pub base_docker_image: String,

    /// `MCP_SERVER_LOG_MAX_SIZE`, a number with a `K`/`M`/`G` suffix.
    #[serde(default = "default_log_max_size")]
    pub log_max_size: String,

    /// `MCP_SERVER_LOG_MAX_FILES`.
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,

    /// Container-name prefix bracketing the slugified display name.
    #[serde(default = "default_container_name_prefix")]
    pub container_name_prefix: String,

    /// Container-name suffix bracketing the slugified display name.
    #[serde(default = "default_container_name_suffix")]
    pub container_name_suffix: String,

    /// Fixed product mount root for `allowed_directories` bind mounts.
    #[serde(default = "default_mount_root")]
    pub allowed_directories_mount_root: String,

    /// Root directory for per-container rotating log files.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Docker socket override; `None` means auto-detect via local defaults.
    #[serde(default)]
    pub docker_socket_path: Option<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            base_docker_image: default_base_image(),
            log_max_size: default_log_max_size(),
            log_max_files: default_log_max_files(),
            container_name_prefix: default_container_name_prefix(),
            container_name_suffix: default_container_name_suffix(),
            allowed_directories_mount_root: default_mount_root(),
            log_dir: default_log_dir(),
            docker_socket_path: None,
        }
    }
}

impl SupervisorConfig {
    /// Load from an optional YAML file, then apply the handful of documented
    /// environment-variable overrides. Missing file is not an error —
    /// defaults are used.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path)?;
                serde_yaml::from_str(&text)?
            }
            _ => Self::default(),
        };

        if let Ok(image) = std::env::var("MCP_BASE_DOCKER_IMAGE") {
            config.base_docker_image = image;
        }
        if let Ok(size) = std::env::var("MCP_SERVER_LOG_MAX_SIZE") {
            config.log_max_size = size;
        }
        if let Ok(files) = std::env::var("MCP_SERVER_LOG_MAX_FILES") {
            if let Ok(files) = files.parse() {
                config.log_max_files = files;
            }
        }

        Ok(config)
    }

    /// Parse `log_max_size` (`"5M"`, `"512K"`, `"1G"`, or a bare byte count)
    /// into a byte threshold for the log pipe's rotation policy.
    pub fn log_max_size_bytes(&self) -> u64 {
        parse_size_with_suffix(&self.log_max_size).unwrap_or(5 * 1024 * 1024)
    }
}

fn parse_size_with_suffix(input: &str) -> Option<u64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    let (digits, multiplier): (&str, u64) = match input.chars().last().unwrap() {
        'K' | 'k' => (&input[..input.len() - 1], 1024),
        'M' | 'm' => (&input[..input.len() - 1], 1024 * 1024),
        'G' | 'g' => (&input[..input.len() - 1], 1024 * 1024 * 1024),
        _ => (input, 1),
    };
    digits.trim().parse::<u64>().ok().map(|n| n * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = SupervisorConfig::default();
        assert_eq!(config.log_max_files, 2);
        assert_eq!(config.log_max_size_bytes(), 5 * 1024 * 1024);
    }

    #[test]
    fn size_suffix_parsing() {
        assert_eq!(parse_size_with_suffix("512K"), Some(512 * 1024));
        assert_eq!(parse_size_with_suffix("2G"), Some(2 * 1024 * 1024 * 1024));
        assert_eq!(parse_size_with_suffix("100"), Some(100));
        assert_eq!(parse_size_with_suffix(""), None);
    }
}
