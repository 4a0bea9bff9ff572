// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `mcp-sandbox-daemon` library surface - exposes the daemon wiring so the
//! binary and integration tests share one code path.

pub mod daemon;
