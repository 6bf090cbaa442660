//! # berth-events
//!
//! Live notification fan-out for the Berth control plane.
//!
//! Observers subscribe to an [`EventBus`](bus::EventBus) and receive
//! content-free [`Notification`](notification::Notification)s: `refresh`
//! when state changed and they should re-fetch, `ping` to keep idle
//! connections open through proxies.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod bus;
pub mod notification;

pub use bus::{BroadcastReport, EventBus, ObserverId, Subscription};
pub use notification::Notification;
