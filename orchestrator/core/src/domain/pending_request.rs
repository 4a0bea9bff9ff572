// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `PendingRequest` — an in-flight JSON-RPC call awaiting a response. Owned
//! exclusively by a single [`crate::infrastructure::stdio_multiplexer::StdioMultiplexer`]
//! instance; resolved exactly once, by whichever of {response, timeout,
//! transport error} happens first.

use serde_json::Value;
use tokio::sync::oneshot;

/// How a `PendingRequest` was ultimately resolved, forwarded to the waiting caller.
#[derive(Debug)]
pub enum PendingOutcome {
    /// A matching response frame arrived from the MCP.
    Response(Value),
    /// The 30s per-request deadline elapsed with no matching frame.
    Timeout,
    /// The socket errored or closed; every outstanding entry resolves this way.
    TransportError(String),
}

/// One entry in a multiplexer's pending-request table, keyed by request id.
pub struct PendingRequest {
    pub id: String,
    sender: Option<oneshot::Sender<PendingOutcome>>,
}

impl PendingRequest {
    pub fn new(id: String) -> (Self, oneshot::Receiver<PendingOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                id,
                sender: Some(tx),
            },
            rx,
        )
    }

    /// Resolve exactly once; subsequent calls are no-ops (the `Sender` was
    /// already consumed), matching the "resolved exactly once" invariant.
    pub fn resolve(mut self, outcome: PendingOutcome) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_exactly_once_with_response() {
        let (pending, rx) = PendingRequest::new("7".into());
        pending.resolve(PendingOutcome::Response(serde_json::json!({"ok": true})));
        match rx.await.unwrap() {
            PendingOutcome::Response(v) => assert_eq!(v["ok"], true),
            _ => panic!("expected response outcome"),
        }
    }

    #[tokio::test]
    async fn dropped_pending_request_closes_receiver() {
        let (pending, rx) = PendingRequest::new("abc".into());
        drop(pending);
        assert!(rx.await.is_err());
    }
}
