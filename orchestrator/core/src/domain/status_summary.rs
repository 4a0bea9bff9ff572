// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `StatusSummary` — the derived, value-copy snapshot the event bus publishes
//! to observers. Never a live reference into the registry: status snapshots
//! passed to the event bus are always copies, so observers can't see partial
//! mutations or keep a registry entry alive past its removal.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

use crate::domain::container_state::ContainerState;
use crate::domain::runtime_state::RuntimeState;
use crate::domain::tool::ToolDescriptor;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpStatus {
    pub container: ContainerState,
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSummary {
    pub runtime: RuntimeState,
    pub mcps: HashMap<String, McpStatus>,
}

impl StatusSummary {
    pub fn new(runtime: RuntimeState) -> Self {
        Self {
            runtime,
            mcps: HashMap::new(),
        }
    }

    /// Count of registered MCPs in each container lifecycle state, keyed by
    /// the same snake_case labels `ContainerLifecycleState` serializes to.
    pub fn mcp_counts_by_state(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for status in self.mcps.values() {
            let label = serde_json::to_value(status.container.state)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "unknown".to_string());
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }
}
