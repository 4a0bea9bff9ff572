// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `InstalledMCP` — the configuration record loaded from persistence.
//!
//! Owned by the persistence adapter. The Supervisor treats a fetched
//! record as an immutable snapshot for the duration of a lifecycle
//! generation and mutates only the OAuth token fields, via
//! [`crate::application::persistence::InstalledMcpStore::save_oauth_tokens`].

use std::collections::HashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether an MCP runs as a local sandboxed container or as a remote HTTPS endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpType {
    Local,
    Remote,
}

/// The command/args/env/file-injection shape an installer persists for a local MCP.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// In-container process, or a `docker`/`podman` wrapper invocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Container path -> file content, mounted read-only at container create time.
    #[serde(default)]
    pub file_injections: HashMap<String, String>,
}

/// OAuth bearer credentials persisted for an MCP, opaque beyond expiry bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Seconds-from-issue validity window, as returned by the token endpoint.
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub issued_at: Option<DateTime<Utc>>,
}

impl OAuthTokens {
    /// Header value for `Authorization: Bearer <token>`, defaulting `token_type` to Bearer.
    pub fn bearer_header_value(&self) -> String {
        let scheme = self.token_type.as_deref().unwrap_or("Bearer");
        format!("{} {}", scheme, self.access_token)
    }

    /// True when the token expires within `within`, or has no known expiry (conservatively false).
    pub fn expires_within(&self, within: chrono::Duration) -> bool {
        match (self.issued_at, self.expires_in) {
            (Some(issued_at), Some(expires_in)) => {
                let expiry = issued_at + chrono::Duration::seconds(expires_in);
                expiry - Utc::now() <= within
            }
            _ => false,
        }
    }
}

/// Installed MCP configuration record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledMcp {
    pub id: String,
    pub display_name: String,
    pub mcp_type: McpType,
    pub server_config: ServerConfig,
    #[serde(default)]
    pub user_config: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_tokens: Option<OAuthTokens>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_config: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl InstalledMcp {
    /// Container name derivation: lowercase the
    /// display name, replace whitespace runs with a single hyphen, bracket
    /// with the product prefix/suffix. Total and collision-free as long as no
    /// two installed MCPs share a case-insensitive display name.
    pub fn container_name(&self, prefix: &str, suffix: &str) -> String {
        let slug: String = self
            .display_name
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        format!("{prefix}{slug}{suffix}")
    }

    /// The declared streamable-HTTP container port, if `oauth_config` carries one.
    pub fn streamable_http_port(&self) -> Option<u16> {
        self.oauth_config
            .as_ref()
            .and_then(|cfg| cfg.get("streamable_http_port"))
            .and_then(Value::as_u64)
            .and_then(|p| u16::try_from(p).ok())
    }

    /// The URL scheme to rebuild the streamable-HTTP MCP URL with once its
    /// host port is known, `oauth_config.streamable_http_scheme`, default `http`.
    fn streamable_http_scheme(&self) -> &str {
        self.oauth_config
            .as_ref()
            .and_then(|cfg| cfg.get("streamable_http_scheme"))
            .and_then(Value::as_str)
            .unwrap_or("http")
    }

    /// The path component, `oauth_config.streamable_http_path`, default `/`.
    fn streamable_http_path(&self) -> String {
        let raw = self
            .oauth_config
            .as_ref()
            .and_then(|cfg| cfg.get("streamable_http_path"))
            .and_then(Value::as_str)
            .unwrap_or("/");
        if raw.starts_with('/') {
            raw.to_string()
        } else {
            format!("/{raw}")
        }
    }

    /// Rebuilds `origin://host:<assigned_port>/<path>` from the configured
    /// template once the host has assigned a port for the container side.
    pub fn streamable_http_url(&self, host: &str, assigned_port: u16) -> String {
        format!("{}://{host}:{assigned_port}{}", self.streamable_http_scheme(), self.streamable_http_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcp(name: &str) -> InstalledMcp {
        InstalledMcp {
            id: "abc".into(),
            display_name: name.into(),
            mcp_type: McpType::Local,
            server_config: ServerConfig::default(),
            user_config: HashMap::new(),
            remote_url: None,
            oauth_tokens: None,
            oauth_config: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn container_name_lowercases_and_hyphenates() {
        let m = mcp("LinkedIn  Scraper");
        assert_eq!(m.container_name("archestra-mcp-", "-sandbox"), "archestra-mcp-linkedin-scraper-sandbox");
    }

    #[test]
    fn oauth_token_expiry_window() {
        let mut tokens = OAuthTokens {
            access_token: "tok".into(),
            token_type: None,
            expires_in: Some(60),
            issued_at: Some(Utc::now() - chrono::Duration::seconds(30)),
        };
        assert!(tokens.expires_within(chrono::Duration::minutes(5)));
        tokens.expires_in = Some(3600);
        assert!(!tokens.expires_within(chrono::Duration::minutes(5)));
    }

    #[test]
    fn bearer_header_defaults_to_bearer_scheme() {
        let tokens = OAuthTokens {
            access_token: "tok".into(),
            token_type: None,
            expires_in: None,
            issued_at: None,
        };
        assert_eq!(tokens.bearer_header_value(), "Bearer tok");
    }

    #[test]
    fn streamable_http_url_defaults_to_http_and_root_path() {
        let m = mcp("search-server");
        assert_eq!(m.streamable_http_url("127.0.0.1", 54321), "http://127.0.0.1:54321/");
    }

    #[test]
    fn streamable_http_url_honors_configured_scheme_and_path() {
        let mut m = mcp("search-server");
        m.oauth_config = Some(serde_json::json!({
            "streamable_http_scheme": "https",
            "streamable_http_path": "mcp",
        }));
        assert_eq!(m.streamable_http_url("127.0.0.1", 54321), "https://127.0.0.1:54321/mcp");
    }
}
