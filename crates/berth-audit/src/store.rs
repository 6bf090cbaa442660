//! Audit store contract and the in-memory store.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use berth_common::error::Result;
use chrono::Utc;

use crate::record::{AuditEntry, AuditRecord};

/// Durable insert-and-query storage for audit records.
///
/// Guarantees:
/// - `insert` assigns the record identifier and creation time.
/// - `query` returns records newest first, at most `limit` of them,
///   restricted to one principal when a filter is given.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Appends one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be persisted.
    async fn insert(&self, entry: AuditEntry) -> Result<AuditRecord>;

    /// Reads records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn query(&self, principal: Option<&str>, limit: usize) -> Result<Vec<AuditRecord>>;
}

/// Keeps records for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every record in insertion order.
    #[must_use]
    pub fn all(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn insert(&self, entry: AuditEntry) -> Result<AuditRecord> {
        let record = entry.into_record(uuid::Uuid::new_v4().to_string(), Utc::now());
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(record)
    }

    async fn query(&self, principal: Option<&str>, limit: usize) -> Result<Vec<AuditRecord>> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(newest_first(records.iter(), principal, limit))
    }
}

/// Filters records in insertion order down to the newest `limit` for
/// `principal`.
pub(crate) fn newest_first<'a>(
    records: impl DoubleEndedIterator<Item = &'a AuditRecord>,
    principal: Option<&str>,
    limit: usize,
) -> Vec<AuditRecord> {
    records
        .rev()
        .filter(|r| principal.is_none_or(|p| r.principal == p))
        .take(limit)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use berth_common::types::Principal;

    use super::*;
    use crate::record::AuditAction;

    fn entry(principal: &str, action: AuditAction) -> AuditEntry {
        AuditEntry::new(&Principal::new(principal), action)
    }

    #[tokio::test]
    async fn insert_assigns_id_and_time() {
        let store = MemoryAuditStore::new();
        let before = Utc::now();
        let record = store
            .insert(entry("u1", AuditAction::Login))
            .await
            .unwrap();
        assert!(!record.id.is_empty());
        assert!(record.created_at >= before);
    }

    #[tokio::test]
    async fn query_is_newest_first_and_filtered() {
        let store = MemoryAuditStore::new();
        let _ = store.insert(entry("u1", AuditAction::StartContainer)).await.unwrap();
        let _ = store.insert(entry("u2", AuditAction::StartContainer)).await.unwrap();
        let _ = store.insert(entry("u1", AuditAction::StopContainer)).await.unwrap();

        let mine = store.query(Some("u1"), 100).await.unwrap();
        let actions: Vec<_> = mine.iter().map(|r| r.action).collect();
        assert_eq!(actions, vec![AuditAction::StopContainer, AuditAction::StartContainer]);
        assert!(mine.iter().all(|r| r.principal == "u1"));

        assert_eq!(store.query(None, 100).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn query_truncates_to_limit() {
        let store = MemoryAuditStore::new();
        for _ in 0..5 {
            let _ = store.insert(entry("u1", AuditAction::Login)).await.unwrap();
        }
        assert_eq!(store.query(Some("u1"), 2).await.unwrap().len(), 2);
    }
}
