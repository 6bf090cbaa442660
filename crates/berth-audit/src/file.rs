//! JSON-lines audit trail on local disk.
//!
//! One record per line, appended and synced before the write returns.
//! Queries scan the file; lines that fail to parse are skipped with a
//! warning rather than failing the whole read.

use std::path::PathBuf;

use async_trait::async_trait;
use berth_common::error::{BerthError, Result};
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::record::{AuditEntry, AuditRecord};
use crate::store::{AuditStore, newest_first};

/// Append-only audit file.
#[derive(Debug)]
pub struct FileAuditStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileAuditStore {
    /// Opens (creating the parent directory of) an audit file.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| BerthError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    async fn read_all(&self) -> Result<Vec<AuditRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(BerthError::Io {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };
        let mut records = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = number + 1,
                    error = %e,
                    "skipping unreadable audit line"
                ),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl AuditStore for FileAuditStore {
    async fn insert(&self, entry: AuditEntry) -> Result<AuditRecord> {
        let record = entry.into_record(uuid::Uuid::new_v4().to_string(), Utc::now());
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        let io_err = |e: std::io::Error| BerthError::Io {
            path: self.path.clone(),
            source: e,
        };
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io_err)?;
        file.write_all(line.as_bytes()).await.map_err(io_err)?;
        file.sync_data().await.map_err(io_err)?;
        Ok(record)
    }

    async fn query(&self, principal: Option<&str>, limit: usize) -> Result<Vec<AuditRecord>> {
        let records = {
            let _guard = self.lock.lock().await;
            self.read_all().await?
        };
        Ok(newest_first(records.iter(), principal, limit))
    }
}

#[cfg(test)]
mod tests {
    use berth_common::types::Principal;

    use super::*;
    use crate::record::AuditAction;

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileAuditStore::open(dir.path().join("audit.jsonl")).expect("open");
        assert!(store.query(None, 100).await.expect("query").is_empty());
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("audit.jsonl");
        {
            let store = FileAuditStore::open(&path).expect("open");
            let _ = store
                .insert(
                    AuditEntry::new(&Principal::new("u1"), AuditAction::DeleteImage)
                        .image("nginx:latest"),
                )
                .await
                .expect("insert");
        }
        let reopened = FileAuditStore::open(&path).expect("reopen");
        let records = reopened.query(Some("u1"), 100).await.expect("query");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].image.as_deref(), Some("nginx:latest"));
        assert_eq!(records[0].action, AuditAction::DeleteImage);
    }

    #[tokio::test]
    async fn corrupt_lines_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audit.jsonl");
        let store = FileAuditStore::open(&path).expect("open");
        let _ = store
            .insert(AuditEntry::new(&Principal::new("u1"), AuditAction::Login))
            .await
            .expect("insert");
        let mut content = std::fs::read_to_string(&path).expect("read");
        content.push_str("{not json\n");
        std::fs::write(&path, content).expect("write");
        let _ = store
            .insert(AuditEntry::new(&Principal::new("u1"), AuditAction::Logout))
            .await
            .expect("insert");

        let records = store.query(None, 100).await.expect("query");
        let actions: Vec<_> = records.iter().map(|r| r.action).collect();
        assert_eq!(actions, vec![AuditAction::Logout, AuditAction::Login]);
    }
}
