// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `StdioMultiplexer` — one persistent hijacked attach socket per running
//! stdio MCP container, with JSON-RPC request/response correlation over
//! newline-delimited frames.
//!
//! Transport demultiplexing (the 8-byte stream-kind/length header) is
//! handled by bollard's own `attach_container`, which already splits
//! stdin/stdout/stderr for us — see [`crate::infrastructure::frame_decoder::FrameDecoder`]
//! for the explicit, independently tested reference implementation of that
//! wire format. This module owns what bollard doesn't: JSON-line
//! reassembly, request/response correlation, and write serialization.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bollard::container::{AttachContainerOptions, LogOutput};
use bollard::Docker;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::domain::errors::MultiplexError;
use crate::domain::pending_request::{PendingOutcome, PendingRequest};
use crate::infrastructure::frame_decoder::JsonAccumulator;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type AttachInput = std::pin::Pin<Box<dyn tokio::io::AsyncWrite + Send>>;

struct Connection {
    input: AsyncMutex<AttachInput>,
}

/// One per running stdio MCP container. Cheap to clone; shares the pending
/// table and connection handle via `Arc`.
#[derive(Clone)]
pub struct StdioMultiplexer {
    docker: Docker,
    container_name: String,
    connection: Arc<AsyncMutex<Option<Arc<Connection>>>>,
    pending: Arc<DashMap<String, PendingRequest>>,
}

impl StdioMultiplexer {
    pub fn new(docker: Docker, container_name: String) -> Self {
        Self {
            docker,
            container_name,
            connection: Arc::new(AsyncMutex::new(None)),
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Ensures exactly one live connection. Concurrent callers serialize on
    /// the connection mutex rather than a separate poll loop, which gives
    /// the same "wait for the in-flight connect" behavior without a
    /// busy-wait.
    async fn get_or_create_socket(&self) -> Result<Arc<Connection>, MultiplexError> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let options = Some(AttachContainerOptions::<String> {
            stdin: Some(true),
            stdout: Some(true),
            stderr: Some(true),
            stream: Some(true),
            logs: Some(false),
            ..Default::default()
        });

        let attach = self
            .docker
            .attach_container(&self.container_name, options)
            .await
            .map_err(|e| MultiplexError::AttachFailed(e.to_string()))?;

        let conn = Arc::new(Connection {
            input: AsyncMutex::new(attach.input),
        });
        *guard = Some(conn.clone());
        drop(guard);

        self.spawn_reader(attach.output);
        Ok(conn)
    }

    fn spawn_reader(&self, mut output: impl futures::Stream<Item = Result<LogOutput, bollard::errors::Error>> + Unpin + Send + 'static) {
        let pending = self.pending.clone();
        let connection = self.connection.clone();
        let container_name = self.container_name.clone();

        tokio::spawn(async move {
            let mut accumulator = JsonAccumulator::new();
            loop {
                match output.next().await {
                    Some(Ok(LogOutput::StdOut { message })) | Some(Ok(LogOutput::Console { message })) => {
                        let text = String::from_utf8_lossy(&message);
                        for line in accumulator.push(&text) {
                            dispatch_line(&pending, &line);
                        }
                    }
                    Some(Ok(LogOutput::StdErr { message })) => {
                        debug!(container = %container_name, "mcp stderr: {}", String::from_utf8_lossy(&message));
                    }
                    Some(Ok(LogOutput::StdIn { .. })) => {}
                    Some(Err(e)) => {
                        warn!(container = %container_name, error = %e, "attach stream error, closing connection");
                        reject_all(&pending, e.to_string());
                        *connection.lock().await = None;
                        return;
                    }
                    None => {
                        warn!(container = %container_name, "attach stream closed");
                        reject_all(&pending, "attach stream closed".to_string());
                        *connection.lock().await = None;
                        return;
                    }
                }
            }
        });
    }

    /// A non-notification request missing `id` is a hard error rather than a
    /// synthesized UUID.
    pub async fn send_request(&self, body: Value) -> Result<Value, MultiplexError> {
        let is_notification = body
            .get("method")
            .and_then(Value::as_str)
            .map(|m| m.contains("notification"))
            .unwrap_or(false);
        let id = body.get("id").cloned();

        if id.is_none() || id.as_ref().map(Value::is_null).unwrap_or(false) {
            if is_notification {
                self.write_line(&body).await?;
                return Ok(Value::Object(Default::default()));
            }
            return Err(MultiplexError::MissingRequestId);
        }

        let id_key = id.as_ref().map(stringify_id).expect("checked above");
        let (pending_request, rx) = PendingRequest::new(id_key.clone());
        self.pending.insert(id_key.clone(), pending_request);

        self.write_line(&body).await?;

        let outcome = tokio::time::timeout(REQUEST_TIMEOUT, rx).await;
        self.pending.remove(&id_key);

        match outcome {
            Ok(Ok(PendingOutcome::Response(value))) => Ok(value),
            Ok(Ok(PendingOutcome::Timeout)) | Err(_) => Ok(timeout_response(id)),
            Ok(Ok(PendingOutcome::TransportError(message))) => Err(MultiplexError::Transport(message)),
            Ok(Err(_)) => Err(MultiplexError::Transport("pending request channel dropped".into())),
        }
    }

    async fn write_line(&self, body: &Value) -> Result<(), MultiplexError> {
        let conn = self.get_or_create_socket().await?;
        let mut line = serde_json::to_vec(body).map_err(|e| MultiplexError::Transport(e.to_string()))?;
        line.push(b'\n');

        let mut input = conn.input.lock().await;
        use tokio::io::AsyncWriteExt;
        input
            .write_all(&line)
            .await
            .map_err(|e| MultiplexError::Transport(e.to_string()))?;
        input.flush().await.map_err(|e| MultiplexError::Transport(e.to_string()))
    }

    /// Cancel every outstanding pending request with a transport error and
    /// drop the connection, used on container stop and graceful shutdown.
    pub async fn close(&self) {
        reject_all(&self.pending, "multiplexer closed".to_string());
        *self.connection.lock().await = None;
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

fn dispatch_line(pending: &DashMap<String, PendingRequest>, line: &str) {
    let Ok(value) = serde_json::from_str::<Value>(line) else {
        return;
    };

    match value.get("id") {
        Some(id) if !id.is_null() => {
            let key = stringify_id(id);
            if let Some((_, request)) = pending.remove(&key) {
                request.resolve(PendingOutcome::Response(value));
            } else {
                debug!(id = %key, "response for unknown or already-timed-out request, dropped");
            }
        }
        _ => {
            // Notification: has method, no id. Currently ignored.
        }
    }
}

fn reject_all(pending: &DashMap<String, PendingRequest>, message: String) {
    let keys: Vec<String> = pending.iter().map(|entry| entry.key().clone()).collect();
    for key in keys {
        if let Some((_, request)) = pending.remove(&key) {
            request.resolve(PendingOutcome::TransportError(message.clone()));
        }
    }
}

fn stringify_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn timeout_response(id: Option<Value>) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": -32603, "message": "Timeout waiting for MCP server response" }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_resolves_matching_pending_request() {
        let pending = DashMap::new();
        let (request, mut rx) = PendingRequest::new("7".into());
        pending.insert("7".to_string(), request);

        dispatch_line(&pending, r#"{"jsonrpc":"2.0","id":7,"result":{"ok":true}}"#);

        assert!(pending.is_empty());
        let outcome = rx.try_recv();
        assert!(matches!(outcome, Ok(PendingOutcome::Response(_))));
    }

    #[test]
    fn dispatch_ignores_notifications_without_id() {
        let pending: DashMap<String, PendingRequest> = DashMap::new();
        dispatch_line(&pending, r#"{"jsonrpc":"2.0","method":"log","params":{}}"#);
        assert!(pending.is_empty());
    }

    #[test]
    fn dispatch_drops_late_response_for_unknown_id_without_panicking() {
        let pending: DashMap<String, PendingRequest> = DashMap::new();
        dispatch_line(&pending, r#"{"jsonrpc":"2.0","id":99,"result":{}}"#);
        assert!(pending.is_empty());
    }

    #[test]
    fn reject_all_resolves_every_outstanding_entry() {
        let pending = DashMap::new();
        let (r1, mut rx1) = PendingRequest::new("a".into());
        let (r2, mut rx2) = PendingRequest::new("b".into());
        pending.insert("a".to_string(), r1);
        pending.insert("b".to_string(), r2);

        reject_all(&pending, "socket closed".to_string());

        assert!(matches!(rx1.try_recv(), Ok(PendingOutcome::TransportError(_))));
        assert!(matches!(rx2.try_recv(), Ok(PendingOutcome::TransportError(_))));
    }
}
