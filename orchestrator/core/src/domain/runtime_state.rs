// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `RuntimeState` — owned exclusively by the Sandbox Manager.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeStatus {
    NotInstalled,
    Initializing,
    Running,
    Stopping,
    Stopped,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeState {
    pub status: RuntimeStatus,
    pub machine_startup_percentage: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_error: Option<String>,
    pub image_pull_percentage: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<String>,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            status: RuntimeStatus::NotInstalled,
            machine_startup_percentage: 0,
            machine_message: None,
            machine_error: None,
            image_pull_percentage: 0,
            image_message: None,
            image_error: None,
            socket_path: None,
        }
    }
}

impl RuntimeState {
    pub fn mark_initializing(&mut self) {
        self.status = RuntimeStatus::Initializing;
        self.machine_error = None;
    }

    pub fn mark_machine_progress(&mut self, percentage: u8, message: impl Into<String>) {
        self.machine_startup_percentage = percentage;
        self.machine_message = Some(message.into());
    }

    pub fn mark_image_progress(&mut self, percentage: u8, message: impl Into<String>) {
        self.image_pull_percentage = percentage;
        self.image_message = Some(message.into());
    }

    pub fn mark_running(&mut self, socket_path: impl Into<String>) {
        self.status = RuntimeStatus::Running;
        self.machine_startup_percentage = 100;
        self.image_pull_percentage = 100;
        self.socket_path = Some(socket_path.into());
    }

    pub fn mark_stopping(&mut self) {
        self.status = RuntimeStatus::Stopping;
    }

    pub fn mark_stopped(&mut self) {
        self.status = RuntimeStatus::Stopped;
        self.socket_path = None;
    }

    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status = RuntimeStatus::Error;
        self.machine_error = Some(message.into());
    }

    pub fn mark_not_installed(&mut self) {
        *self = RuntimeState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_not_installed() {
        let state = RuntimeState::default();
        assert_eq!(state.status, RuntimeStatus::NotInstalled);
        assert_eq!(state.machine_startup_percentage, 0);
    }

    #[test]
    fn running_implies_full_progress_and_socket() {
        let mut state = RuntimeState::default();
        state.mark_initializing();
        state.mark_running("/var/run/product/control.sock");
        assert_eq!(state.status, RuntimeStatus::Running);
        assert_eq!(state.machine_startup_percentage, 100);
        assert!(state.socket_path.is_some());
    }

    #[test]
    fn error_carries_message() {
        let mut state = RuntimeState::default();
        state.mark_error("daemon unreachable");
        assert_eq!(state.status, RuntimeStatus::Error);
        assert_eq!(state.machine_error.as_deref(), Some("daemon unreachable"));
    }
}
