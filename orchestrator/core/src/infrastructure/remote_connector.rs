// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `RemoteMcpConnector` — streamable-HTTP JSON-RPC client to a remote MCP,
//! bearer-token authenticated with exponential-backoff retry.

use std::time::Duration;

use chrono::Duration as ChronoDuration;
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use crate::domain::errors::ConnectorError;
use crate::domain::installed_mcp::OAuthTokens;

const MAX_ATTEMPTS: u32 = 3;
const EXPIRY_WARNING_WINDOW_MINUTES: i64 = 5;

#[derive(Debug)]
pub struct RemoteMcpConnector {
    client: Client,
    url: String,
    bearer: Option<String>,
}

impl RemoteMcpConnector {
    /// An unconnected stand-in, used only so a remote wrapper can be
    /// registered before it has actually dialed out. `start_remote` replaces
    /// this with a real connector before any call is made; calling through a
    /// placeholder would fail since `url` is empty.
    pub(crate) fn placeholder() -> Self {
        Self { client: Client::new(), url: String::new(), bearer: None }
    }

    /// Retries up to 3 times with exponential backoff 1s/2s/4s capped at
    /// 5s, warning first if the token is near expiry (refresh is an
    /// external collaborator's job).
    pub async fn connect(url: &str, tokens: &OAuthTokens) -> Result<Self, ConnectorError> {
        if tokens.expires_within(ChronoDuration::minutes(EXPIRY_WARNING_WINDOW_MINUTES)) {
            warn!(url, "remote MCP access token is near expiry; refresh is handled outside the core");
        }

        Self::connect_with_bearer(url, Some(tokens.bearer_header_value())).await
    }

    /// Same retry/backoff policy as [`Self::connect`], but for a local
    /// streamable-HTTP container reachable on the host's loopback interface
    /// with no bearer token.
    pub async fn connect_local(url: &str) -> Result<Self, ConnectorError> {
        Self::connect_with_bearer(url, None).await
    }

    async fn connect_with_bearer(url: &str, bearer: Option<String>) -> Result<Self, ConnectorError> {
        let client = Client::new();

        let mut last_error = String::new();
        for attempt in 0..MAX_ATTEMPTS {
            match probe(&client, url, bearer.as_deref()).await {
                Ok(()) => {
                    return Ok(Self {
                        client,
                        url: url.to_string(),
                        bearer,
                    });
                }
                Err(e) => {
                    last_error = e;
                    if attempt + 1 < MAX_ATTEMPTS {
                        let backoff = backoff_duration(attempt);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        Err(ConnectorError::ConnectFailed {
            attempts: MAX_ATTEMPTS,
            last_error,
        })
    }

    /// An MCP `tools/list` call over the connector's HTTP transport.
    pub async fn list_tools(&self) -> Result<Value, ConnectorError> {
        self.call(serde_json::json!({
            "jsonrpc": "2.0",
            "id": "tools-list",
            "method": "tools/list",
        }))
        .await
    }

    pub async fn call(&self, body: Value) -> Result<Value, ConnectorError> {
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(bearer) = &self.bearer {
            request = request.header("Authorization", bearer);
        }
        let response = request.send().await.map_err(|e| ConnectorError::RemoteError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ConnectorError::RemoteError(format!(
                "remote MCP responded with status {}",
                response.status()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ConnectorError::RemoteError(e.to_string()))
    }

    /// Remote wrappers do not support container-stdio streaming.
    pub fn stream_to_container(&self) -> Result<(), ConnectorError> {
        Err(ConnectorError::StreamingUnsupported)
    }

    pub fn close(&self) {}
}

async fn probe(client: &Client, url: &str, bearer: Option<&str>) -> Result<(), String> {
    let mut request = client
        .post(url)
        .json(&serde_json::json!({ "jsonrpc": "2.0", "id": "probe", "method": "ping" }));
    if let Some(bearer) = bearer {
        request = request.header("Authorization", bearer);
    }
    request.send().await.map_err(|e| e.to_string()).map(|_| ())
}

/// Exponential backoff 1s, 2s, 4s, capped at 5s.
fn backoff_duration(attempt: u32) -> Duration {
    let seconds = 2u64.pow(attempt).min(5);
    Duration::from_secs(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_follows_doubling_sequence_capped_at_five_seconds() {
        assert_eq!(backoff_duration(0), Duration::from_secs(1));
        assert_eq!(backoff_duration(1), Duration::from_secs(2));
        assert_eq!(backoff_duration(2), Duration::from_secs(4));
        assert_eq!(backoff_duration(3), Duration::from_secs(5));
    }
}
