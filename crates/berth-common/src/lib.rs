//! # berth-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the entire Berth workspace.
//!
//! This crate is the leaf of the dependency graph. It depends on no other
//! internal crate and provides the primitives every other crate builds on:
//! the error taxonomy reported to operators, the container and image views
//! fetched from the engine, and the service configuration.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
