//! # berth-audit
//!
//! Every successful mutating action is written once to an append-only
//! trail: who did it, what kind of action, which container or image, and
//! from where. Records are never updated or deleted.
//!
//! Writes are best-effort. [`AuditRecorder::record`](recorder::AuditRecorder::record)
//! never fails the caller; a store failure is logged and reported only in
//! the returned [`RecordOutcome`](recorder::RecordOutcome).

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod file;
pub mod postgrest;
pub mod record;
pub mod recorder;
pub mod store;

pub use record::{AuditAction, AuditEntry, AuditRecord};
pub use recorder::{AuditRecorder, RecordOutcome};
pub use store::{AuditStore, MemoryAuditStore};
