// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `ContainerState` — owned by a single `ContainerController`
//! instance. Invariants enforced by construction helpers, never by the
//! caller poking fields directly:
//!
//! - `startup_percentage == 100 <=> state == Running`
//! - `state == Error => error.is_some()`
//! - `state == NotCreated => startup_percentage == 0`

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerLifecycleState {
    NotCreated,
    Created,
    Initializing,
    Running,
    Error,
    Restarting,
    Stopping,
    Stopped,
    Exited,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerState {
    pub state: ContainerLifecycleState,
    pub startup_percentage: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_host_port: Option<u16>,
    pub container_name: String,
}

impl ContainerState {
    pub fn not_created(container_name: impl Into<String>) -> Self {
        Self {
            state: ContainerLifecycleState::NotCreated,
            startup_percentage: 0,
            message: None,
            error: None,
            assigned_host_port: None,
            container_name: container_name.into(),
        }
    }

    /// Advance to a non-error, non-running startup waypoint.
    pub fn advance(&mut self, state: ContainerLifecycleState, percentage: u8, message: impl Into<String>) {
        debug_assert_ne!(state, ContainerLifecycleState::Error, "use mark_error for failures");
        debug_assert!(
            percentage < 100 || state == ContainerLifecycleState::Running,
            "100% startup implies Running state"
        );
        self.state = state;
        self.startup_percentage = percentage;
        self.message = Some(message.into());
        self.error = None;
    }

    pub fn mark_running(&mut self) {
        self.state = ContainerLifecycleState::Running;
        self.startup_percentage = 100;
        self.error = None;
    }

    pub fn mark_error(&mut self, error: impl Into<String>) {
        self.state = ContainerLifecycleState::Error;
        self.error = Some(error.into());
    }

    pub fn mark_port(&mut self, port: u16) {
        self.assigned_host_port = Some(port);
    }

    pub fn is_running(&self) -> bool {
        self.state == ContainerLifecycleState::Running
    }

    pub fn is_terminal_failure(&self) -> bool {
        self.state == ContainerLifecycleState::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_created_has_zero_progress() {
        let s = ContainerState::not_created("archestra-mcp-foo-sandbox");
        assert_eq!(s.state, ContainerLifecycleState::NotCreated);
        assert_eq!(s.startup_percentage, 0);
    }

    #[test]
    fn running_implies_full_percentage() {
        let mut s = ContainerState::not_created("c");
        s.advance(ContainerLifecycleState::Created, 30, "created");
        s.mark_running();
        assert_eq!(s.startup_percentage, 100);
        assert!(s.is_running());
    }

    #[test]
    fn error_state_always_carries_message() {
        let mut s = ContainerState::not_created("c");
        s.mark_error("image pull failed");
        assert!(s.is_terminal_failure());
        assert_eq!(s.error.as_deref(), Some("image pull failed"));
    }
}
