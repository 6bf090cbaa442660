//! Best-effort audit recording.

use std::sync::Arc;

use berth_common::constants::DEFAULT_AUDIT_LIMIT;
use berth_common::error::Result;

use crate::record::{AuditEntry, AuditRecord};
use crate::store::AuditStore;

/// Result of one audit write.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// The record was persisted.
    Recorded(AuditRecord),
    /// The store rejected the write; the message says why.
    Failed(String),
}

impl RecordOutcome {
    /// Returns whether the record was persisted.
    #[must_use]
    pub const fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }
}

/// Writes audit records without ever failing the caller.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder").finish_non_exhaustive()
    }
}

impl AuditRecorder {
    /// Creates a recorder writing to `store`.
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Appends one record.
    ///
    /// A store failure is logged and returned as [`RecordOutcome::Failed`];
    /// it is never propagated.
    pub async fn record(&self, entry: AuditEntry) -> RecordOutcome {
        let principal = entry.principal.clone();
        let action = entry.action;
        match self.store.insert(entry).await {
            Ok(record) => {
                tracing::debug!(
                    principal = %principal,
                    action = %action,
                    id = %record.id,
                    "audit record written"
                );
                RecordOutcome::Recorded(record)
            }
            Err(e) => {
                tracing::warn!(
                    principal = %principal,
                    action = %action,
                    error = %e,
                    "audit write failed"
                );
                RecordOutcome::Failed(e.to_string())
            }
        }
    }

    /// Reads records newest first, optionally for one principal only.
    ///
    /// `limit` defaults to 100.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn query(
        &self,
        principal: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<AuditRecord>> {
        self.store
            .query(principal, limit.unwrap_or(DEFAULT_AUDIT_LIMIT))
            .await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use berth_common::error::BerthError;
    use berth_common::types::Principal;

    use super::*;
    use crate::record::AuditAction;
    use crate::store::MemoryAuditStore;

    struct BrokenStore;

    #[async_trait]
    impl AuditStore for BrokenStore {
        async fn insert(&self, _entry: AuditEntry) -> Result<AuditRecord> {
            Err(BerthError::Audit {
                message: "store offline".into(),
            })
        }

        async fn query(&self, _principal: Option<&str>, _limit: usize) -> Result<Vec<AuditRecord>> {
            Err(BerthError::Audit {
                message: "store offline".into(),
            })
        }
    }

    #[tokio::test]
    async fn failed_write_is_reported_not_raised() {
        let recorder = AuditRecorder::new(Arc::new(BrokenStore));
        let outcome = recorder
            .record(AuditEntry::new(&Principal::new("u1"), AuditAction::Login))
            .await;
        assert!(!outcome.is_recorded());
        assert!(matches!(outcome, RecordOutcome::Failed(ref m) if m.contains("store offline")));
    }

    #[tokio::test]
    async fn default_limit_is_one_hundred() {
        let recorder = AuditRecorder::new(Arc::new(MemoryAuditStore::new()));
        for _ in 0..105 {
            let outcome = recorder
                .record(AuditEntry::new(&Principal::new("u1"), AuditAction::Login))
                .await;
            assert!(outcome.is_recorded());
        }
        assert_eq!(recorder.query(Some("u1"), None).await.unwrap().len(), 100);
        assert_eq!(recorder.query(Some("u1"), Some(3)).await.unwrap().len(), 3);
        assert!(recorder.query(Some("u2"), None).await.unwrap().is_empty());
    }
}
