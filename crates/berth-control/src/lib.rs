//! Lifecycle orchestration for the Berth control plane.
//!
//! The [`Orchestrator`] validates a request, asks the engine to act, and
//! on success records who did it and tells every observer to re-fetch.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod context;
pub mod orchestrator;

pub use context::{CreateRequest, RequestContext};
pub use orchestrator::Orchestrator;
