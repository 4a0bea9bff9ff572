// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Presentation layer: the HTTP surface (Axum) that bridges external
//! callers to the application layer. No business logic lives here — see
//! [`crate::application::sandbox_manager::SandboxManager`] for that.

pub mod proxy;

pub use proxy::router;
