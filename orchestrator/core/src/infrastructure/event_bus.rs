// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `SandboxEventBus` — best-effort, at-most-once-per-subscriber fan-out of
//! `SandboxEvent`s over a broadcast channel.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::warn;

use crate::domain::events::SandboxEvent;

const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("event bus channel closed")]
    Closed,
    #[error("event receiver lagged by {0} events")]
    Lagged(u64),
}

/// Publishes `SandboxEvent`s; the Supervisor never blocks on publish.
/// Delivery is best-effort.
#[derive(Clone)]
pub struct SandboxEventBus {
    sender: Arc<broadcast::Sender<SandboxEvent>>,
}

impl SandboxEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender: Arc::new(sender) }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Publish to all current subscribers; never awaits, never errors out to
    /// the caller — a publish with zero subscribers is a normal no-op.
    pub fn publish(&self, event: SandboxEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> SandboxEventReceiver {
        SandboxEventReceiver { receiver: self.sender.subscribe() }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct SandboxEventReceiver {
    receiver: broadcast::Receiver<SandboxEvent>,
}

impl SandboxEventReceiver {
    pub async fn recv(&mut self) -> Result<SandboxEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("sandbox event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status_summary::StatusSummary;
    use crate::domain::runtime_state::RuntimeState;

    #[tokio::test]
    async fn published_event_reaches_subscriber() {
        let bus = SandboxEventBus::with_default_capacity();
        let mut receiver = bus.subscribe();

        bus.publish(SandboxEvent::SandboxStatusUpdate(StatusSummary::new(RuntimeState::default())));

        let event = receiver.recv().await.unwrap();
        assert!(matches!(event, SandboxEvent::SandboxStatusUpdate(_)));
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_error() {
        let bus = SandboxEventBus::with_default_capacity();
        bus.publish(SandboxEvent::ToolsUpdated {
            mcp_server_id: "gmail".into(),
            message: "2 tools updated".into(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
