//! # berth-server
//!
//! HTTP surface of the Berth control plane, built on axum.
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/api/auth/login` | POST | Exchange credentials for a bearer token |
//! | `/api/auth/logout` | POST | Record a sign-out |
//! | `/api/containers` | GET, POST | List all containers, create and start one |
//! | `/api/containers/{id}/start` | POST | Start a container |
//! | `/api/containers/{id}/stop` | POST | Stop a container |
//! | `/api/containers/{id}` | DELETE | Remove a stopped container |
//! | `/api/containers/{id}/stats` | GET | CPU and memory utilization |
//! | `/api/containers/{id}/logs` | GET | Last log lines |
//! | `/api/images` | GET | List images |
//! | `/api/images/{id}` | DELETE | Force-remove an image |
//! | `/api/logs` | GET | The caller's audit trail |
//! | `/api/events` | GET | Server-sent `refresh` / `ping` stream |
//! | `/healthz` | GET | Liveness |

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod auth;
pub mod error;
pub mod events;
pub mod handlers;
pub mod identity;
pub mod routes;
pub mod server;
pub mod state;

pub use server::{ServerHandle, build_state, serve};
pub use state::AppState;
