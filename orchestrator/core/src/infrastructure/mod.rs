// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer: everything that talks to the container runtime,
//! the filesystem, or the network.

pub mod container_controller;
pub mod docker_spec;
pub mod event_bus;
pub mod frame_decoder;
pub mod log_pipe;
pub mod persistence_memory;
pub mod remote_connector;
pub mod runtime_driver;
pub mod stdio_multiplexer;

pub use container_controller::ContainerController;
pub use event_bus::{SandboxEventBus, SandboxEventReceiver};
pub use log_pipe::LogPipe;
pub use persistence_memory::InMemoryInstalledMcpStore;
pub use remote_connector::RemoteMcpConnector;
pub use runtime_driver::DockerRuntimeDriver;
pub use stdio_multiplexer::StdioMultiplexer;
