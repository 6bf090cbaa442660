//! Container engine access for the Berth control plane.
//!
//! - [`client`]: the [`RuntimeClient`](client::RuntimeClient) contract every
//!   engine adapter implements.
//! - [`docker`]: an adapter speaking the Docker Engine HTTP API.
//! - [`memory`]: an in-process engine for local development and tests.
//! - [`metrics`]: turns cumulative counters into utilization snapshots.
//! - [`logs`]: decodes the engine's log stream framing.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod client;
pub mod docker;
pub mod logs;
pub mod memory;
pub mod metrics;
